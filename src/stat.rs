use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use ballot_merkle::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct Stat {
  pub count: usize,
  pub mean: f64,
  pub median: f64,
  pub std_dev: f64,
  pub min: f64,
  pub max: f64,
}

impl Stat {
  pub fn from_slice(data: &[f64]) -> Stat {
    if data.is_empty() {
      return Stat { count: 0, mean: f64::NAN, median: f64::NAN, std_dev: f64::NAN, min: f64::NAN, max: f64::NAN };
    }
    let mut data = data.to_vec();
    data.sort_by(f64::total_cmp);
    let count = data.len();
    let min = data[0];
    let max = data[count - 1];
    let mean = data.iter().sum::<f64>() / count as f64;
    let median = if count % 2 == 0 { (data[count / 2 - 1] + data[count / 2]) / 2.0 } else { data[count / 2] };
    let variance = data.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / count as f64;
    Stat { count, mean, median, std_dev: variance.sqrt(), min, max }
  }
}

impl Display for Stat {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    // 2σ (equivalent to 95.4% confidence interval) calculated as a percentage
    let two_sigma_percent = if self.mean > 0.0 { (2.0 * self.std_dev / self.mean) * 100.0 } else { 0.0 };
    write!(
      f,
      "{}: {:.3}μs ±{:.1}% [{:.3}|{:.3}|{:.3}]",
      self.count, self.mean, two_sigma_percent, self.min, self.median, self.max
    )
  }
}

/// Timing samples in microseconds, keyed by leaf count.
#[derive(Debug, Default)]
pub struct Report {
  data_set: BTreeMap<u64, Vec<f64>>,
}

impl Report {
  pub fn new() -> Self {
    Report::default()
  }

  pub fn add(&mut self, n: u64, elapsed: Duration) {
    self.data_set.entry(n).or_default().push(elapsed.as_nanos() as f64 / 1000.0);
  }

  pub fn single(&self, n: u64) -> Stat {
    self.data_set.get(&n).map(|ys| Stat::from_slice(ys)).unwrap_or_else(|| Stat::from_slice(&[]))
  }

  pub fn save_to_csv(&self, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "N,COUNT,MEAN,MEDIAN,STDDEV,MIN,MAX")?;
    for (n, ys) in self.data_set.iter() {
      let y = Stat::from_slice(ys);
      writeln!(
        writer,
        "{},{},{:.3},{:.3},{:.3},{:.3},{:.3}",
        n, y.count, y.mean, y.median, y.std_dev, y.min, y.max
      )?;
    }
    writer.flush()?;
    Ok(())
  }
}
