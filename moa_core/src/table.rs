use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use crate::error::{DataError, MoaError};

/// File name of observation table inside data directory.
pub const OBSERVATIONS_FILE: &str = "X.csv";
/// File name of choice label table inside data directory.
pub const CHOICES_FILE: &str = "y.csv";

/// Preallocated table of `capacity` rows, filled at increasing indices during rollout.
/// Each row holds stacked observation vector and index of actor chosen for it.
///
/// Table must be completely filled before it can be converted into [`CompleteRollout`],
/// which is the only form accepted by embedding and persisted to disk.
#[derive(Debug, Clone)]
pub struct RolloutTable{
    observation_size: usize,
    capacity: usize,
    observations: Vec<f32>,
    choices: Vec<usize>,
}

impl RolloutTable{
    pub fn new(capacity: usize, observation_size: usize) -> Self{
        Self{
            observation_size,
            capacity,
            observations: Vec::with_capacity(capacity * observation_size),
            choices: Vec::with_capacity(capacity),
        }
    }

    /// Records row at next free index and returns the number of rows recorded so far.
    pub fn push(&mut self, observation: &[f32], choice: usize) -> Result<usize, DataError>{
        if self.is_complete(){
            return Err(DataError::TableFull {capacity: self.capacity})
        }
        if observation.len() != self.observation_size{
            return Err(DataError::LengthMismatch {
                left: observation.len(),
                right: self.observation_size,
                context: format!("Recording observation at row {}", self.choices.len()),
            })
        }
        self.observations.extend_from_slice(observation);
        self.choices.push(choice);
        Ok(self.choices.len())
    }

    pub fn len(&self) -> usize{
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool{
        self.choices.is_empty()
    }

    pub fn capacity(&self) -> usize{
        self.capacity
    }

    pub fn is_complete(&self) -> bool{
        self.choices.len() == self.capacity
    }

    pub fn finish(self) -> Result<CompleteRollout, DataError>{
        if !self.is_complete(){
            return Err(DataError::IncompleteTable {
                filled: self.choices.len(),
                expected: self.capacity,
            })
        }
        Ok(CompleteRollout{
            observation_size: self.observation_size,
            observations: self.observations,
            choices: self.choices,
        })
    }
}

/// Fully filled rollout: `len()` observations of `observation_size` elements and aligned choice labels.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteRollout{
    observation_size: usize,
    observations: Vec<f32>,
    choices: Vec<usize>,
}

impl CompleteRollout{

    pub fn from_parts(observation_size: usize, observations: Vec<f32>, choices: Vec<usize>) -> Result<Self, DataError>{
        if observations.len() != observation_size * choices.len(){
            return Err(DataError::LengthMismatch {
                left: observations.len(),
                right: observation_size * choices.len(),
                context: "Observation table does not match number of choice labels".into(),
            })
        }
        Ok(Self{observation_size, observations, choices})
    }

    pub fn observation_size(&self) -> usize{
        self.observation_size
    }

    pub fn len(&self) -> usize{
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool{
        self.choices.is_empty()
    }

    pub fn observation(&self, index: usize) -> Option<&[f32]>{
        let start = index * self.observation_size;
        self.observations.get(start..start + self.observation_size)
    }

    pub fn observations_flat(&self) -> &[f32]{
        &self.observations
    }

    pub fn choices(&self) -> &[usize]{
        &self.choices
    }

    /// Number of rows labelled with each choice in `0..limit`.
    pub fn choice_histogram(&self, limit: usize) -> Result<Vec<usize>, DataError>{
        let mut histogram = vec![0; limit];
        for &c in self.choices.iter(){
            let slot = histogram.get_mut(c)
                .ok_or(DataError::LabelOutOfRange {label: c, limit})?;
            *slot += 1;
        }
        Ok(histogram)
    }

    /// Writes `X.csv` and `y.csv` into directory (numpy `savetxt` layout).
    pub fn save(&self, data_dir: &Path) -> Result<(), MoaError>{
        std::fs::create_dir_all(data_dir)?;
        let rows = self.observations.chunks(self.observation_size.max(1))
            .map(|row| row.iter().map(|v| *v as f64).collect::<Vec<f64>>());
        write_text_table(&data_dir.join(OBSERVATIONS_FILE), rows)?;
        let labels = self.choices.iter().map(|c| vec![*c as f64]);
        write_text_table(&data_dir.join(CHOICES_FILE), labels)?;
        #[cfg(feature = "log_info")]
        log::info!("Saved rollout of {} rows to {}", self.len(), data_dir.display());
        Ok(())
    }

    /// Reads tables written by [`save`](CompleteRollout::save).
    pub fn load(data_dir: &Path) -> Result<Self, MoaError>{
        let observation_rows = read_text_table(&data_dir.join(OBSERVATIONS_FILE))?;
        let label_rows = read_text_table(&data_dir.join(CHOICES_FILE))?;
        if observation_rows.len() != label_rows.len(){
            return Err(DataError::LengthMismatch {
                left: observation_rows.len(),
                right: label_rows.len(),
                context: "Loading observation and choice tables".into(),
            }.into())
        }
        let observation_size = observation_rows.first().map(|r| r.len()).unwrap_or(0);
        let mut observations = Vec::with_capacity(observation_size * observation_rows.len());
        for row in observation_rows{
            observations.extend(row.into_iter().map(|v| v as f32));
        }
        let mut choices = Vec::with_capacity(label_rows.len());
        for (line, row) in label_rows.into_iter().enumerate(){
            choices.push(parse_label(&row, line)?);
        }
        Ok(Self::from_parts(observation_size, observations, choices)?)
    }
}

fn parse_label(row: &[f64], line: usize) -> Result<usize, DataError>{
    match row{
        [v] if *v >= 0.0 && v.fract() == 0.0 => Ok(*v as usize),
        _ => Err(DataError::Malformed {
            line,
            context: format!("Expected single non-negative integer label, found {row:?}"),
        })
    }
}

/// Formats number like numpy's `%.18e`, e.g. `1.500000000000000000e+00`.
///
/// ```
/// use moa_core::table::format_scientific;
/// assert_eq!(format_scientific(1.5), "1.500000000000000000e+00");
/// assert_eq!(format_scientific(-0.025), "-2.500000000000000000e-02");
/// assert_eq!(format_scientific(0.0), "0.000000000000000000e+00");
/// ```
pub fn format_scientific(value: f64) -> String{
    let s = format!("{value:.18e}");
    match s.split_once('e'){
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-'){
                Some(d) => ('-', d),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        },
        None => s.to_lowercase()
    }
}

/// Writes rows of numbers separated by single space, one row per line.
pub fn write_text_table<R: IntoIterator<Item=Vec<f64>>>(path: &Path, rows: R) -> Result<(), MoaError>{
    let mut writer = BufWriter::new(File::create(path)?);
    for row in rows{
        let line = row.iter().map(|v| format_scientific(*v)).collect::<Vec<String>>().join(" ");
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads whitespace separated table of numbers. Every row must have the same number of columns.
/// Empty lines and lines starting with `#` are skipped.
pub fn read_text_table(path: &Path) -> Result<Vec<Vec<f64>>, MoaError>{
    let reader = BufReader::new(File::open(path)?);
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line_number, line) in reader.lines().enumerate(){
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#'){
            continue;
        }
        let row = trimmed.split_whitespace()
            .map(|token| token.parse::<f64>().map_err(|e| DataError::Malformed {
                line: line_number,
                context: format!("Cannot parse \"{token}\" in {}: {e}", path.display()),
            }))
            .collect::<Result<Vec<f64>, DataError>>()?;
        if let Some(first) = rows.first(){
            if first.len() != row.len(){
                return Err(DataError::Malformed {
                    line: line_number,
                    context: format!("Expected {} columns, found {}", first.len(), row.len()),
                }.into())
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Single rollout sample projected to 2D.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedPoint{
    /// Row index in originating rollout.
    pub index: usize,
    pub features: Vec<f32>,
    pub label: usize,
    pub x: f64,
    pub y: f64,
    pub x_bin: i64,
    pub y_bin: i64,
}

impl EmbeddedPoint{
    /// Builds point, bins are coordinates truncated toward zero.
    pub fn new(index: usize, features: Vec<f32>, label: usize, x: f64, y: f64) -> Self{
        Self{
            index,
            features,
            label,
            x,
            y,
            x_bin: x.trunc() as i64,
            y_bin: y.trunc() as i64,
        }
    }
}

#[cfg(test)]
mod tests{
    use crate::table::{CompleteRollout, EmbeddedPoint, RolloutTable, format_scientific};

    #[test]
    fn table_must_be_filled_before_finish(){
        let mut table = RolloutTable::new(2, 3);
        table.push(&[1.0, 2.0, 3.0], 0).unwrap();
        assert!(table.clone().finish().is_err());
        assert_eq!(table.push(&[4.0, 5.0, 6.0], 2).unwrap(), 2);
        assert!(table.push(&[7.0, 8.0, 9.0], 1).is_err());
        let rollout = table.finish().unwrap();
        assert_eq!(rollout.len(), 2);
        assert_eq!(rollout.observation(1).unwrap(), &[4.0, 5.0, 6.0]);
        assert_eq!(rollout.choices(), &[0, 2]);
        assert_eq!(rollout.choice_histogram(3).unwrap(), vec![1, 0, 1]);
        assert!(rollout.choice_histogram(2).is_err());
    }

    #[test]
    fn observation_width_is_checked(){
        let mut table = RolloutTable::new(2, 3);
        assert!(table.push(&[1.0, 2.0], 0).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn numpy_exponent_format(){
        assert_eq!(format_scientific(2.0), "2.000000000000000000e+00");
        assert_eq!(format_scientific(1234.5), "1.234500000000000000e+03");
        assert_eq!(format_scientific(-1e-120), "-1.000000000000000000e-120");
    }

    #[test]
    fn save_and_load_tables(){
        let dir = std::env::temp_dir().join(format!("moa_core_table_{}", std::process::id()));
        let rollout = CompleteRollout::from_parts(2, vec![0.5, -1.25, 3.0, 0.0], vec![1, 0]).unwrap();
        rollout.save(&dir).unwrap();
        let first_line = std::fs::read_to_string(dir.join("y.csv")).unwrap();
        assert_eq!(first_line.lines().next().unwrap(), "1.000000000000000000e+00");
        let loaded = CompleteRollout::load(&dir).unwrap();
        assert_eq!(loaded, rollout);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn bins_truncate_toward_zero(){
        let p = EmbeddedPoint::new(0, vec![], 1, -2.7, 3.9);
        assert_eq!((p.x_bin, p.y_bin), (-2, 3));
    }
}
