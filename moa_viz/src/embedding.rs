use std::path::Path;
use log::info;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use moa_core::table::{CompleteRollout, EmbeddedPoint};
use crate::error::VizError;
use crate::tsne::{Tsne, TsneConfig};

/// File name of embedding table inside data directory.
pub const EMBEDDING_FILE: &str = "tsne.csv";

const LABEL_COLUMN: &str = "label";
const X_COLUMN: &str = "x-tsne";
const Y_COLUMN: &str = "y-tsne";
const X_BIN_COLUMN: &str = "x-bin";
const Y_BIN_COLUMN: &str = "y-bin";

/// Rollout rows projected to 2D, ordered by their index in the rollout.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingTable{
    feature_count: usize,
    points: Vec<EmbeddedPoint>,
}

impl EmbeddingTable{
    pub fn new(feature_count: usize, mut points: Vec<EmbeddedPoint>) -> Self{
        points.sort_by_key(|p| p.index);
        Self{feature_count, points}
    }

    pub fn points(&self) -> &[EmbeddedPoint]{
        &self.points
    }

    pub fn feature_count(&self) -> usize{
        self.feature_count
    }

    pub fn len(&self) -> usize{
        self.points.len()
    }

    pub fn is_empty(&self) -> bool{
        self.points.is_empty()
    }

    /// Points labelled with `label`, in rollout order.
    pub fn with_label(&self, label: usize) -> impl Iterator<Item = &EmbeddedPoint>{
        self.points.iter().filter(move |p| p.label == label)
    }

    /// Greatest label present plus one, zero for empty table.
    pub fn label_count(&self) -> usize{
        self.points.iter().map(|p| p.label + 1).max().unwrap_or(0)
    }

    fn header(&self) -> Vec<String>{
        let mut header = Vec::with_capacity(self.feature_count + 6);
        header.push(String::new());
        header.extend((0..self.feature_count).map(|i| format!("feature{i}")));
        header.extend([LABEL_COLUMN, X_COLUMN, Y_COLUMN, X_BIN_COLUMN, Y_BIN_COLUMN].map(String::from));
        header
    }

    /// Writes table with header `,feature0,...,label,x-tsne,y-tsne,x-bin,y-bin`.
    /// The label is written as decimal number (`2.0`).
    pub fn save(&self, path: &Path) -> Result<(), VizError>{
        let csv_error = |e: csv::Error| VizError::Csv {
            path: path.display().to_string(),
            explanation: e.to_string(),
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        writer.write_record(self.header()).map_err(csv_error)?;
        for p in self.points.iter(){
            let mut record = Vec::with_capacity(self.feature_count + 6);
            record.push(p.index.to_string());
            record.extend(p.features.iter().map(|f| f.to_string()));
            record.push(format!("{:.1}", p.label as f64));
            record.push(p.x.to_string());
            record.push(p.y.to_string());
            record.push(p.x_bin.to_string());
            record.push(p.y_bin.to_string());
            writer.write_record(&record).map_err(csv_error)?;
        }
        writer.flush().map_err(|e| VizError::Csv {
            path: path.display().to_string(),
            explanation: e.to_string(),
        })?;
        info!("Saved embedding of {} points to {}", self.len(), path.display());
        Ok(())
    }

    /// Reads table written by [`save`](EmbeddingTable::save).
    pub fn load(path: &Path) -> Result<Self, VizError>{
        let error = |explanation: String| VizError::Csv {
            path: path.display().to_string(),
            explanation,
        };
        let mut reader = csv::Reader::from_path(path).map_err(|e| error(e.to_string()))?;
        let headers = reader.headers().map_err(|e| error(e.to_string()))?.clone();
        let column = |name: &str| headers.iter().position(|h| h == name)
            .ok_or_else(|| error(format!("Missing column \"{name}\"")));
        let label_at = column(LABEL_COLUMN)?;
        let x_at = column(X_COLUMN)?;
        let y_at = column(Y_COLUMN)?;
        let feature_count = headers.iter().filter(|h| h.starts_with("feature")).count();

        let mut points = Vec::new();
        for (line, record) in reader.records().enumerate(){
            let record = record.map_err(|e| error(e.to_string()))?;
            let field = |i: usize| record.get(i)
                .ok_or_else(|| error(format!("Row {line} has no column {i}")));
            let number = |i: usize| field(i)?.trim().parse::<f64>()
                .map_err(|e| error(format!("Row {line}, column {i}: {e}")));

            let index = number(0)? as usize;
            let features = (1..=feature_count)
                .map(|i| number(i).map(|v| v as f32))
                .collect::<Result<Vec<f32>, VizError>>()?;
            let label = number(label_at)?;
            if label < 0.0 || label.fract() != 0.0{
                return Err(error(format!("Row {line}: label {label} is not a non-negative integer")))
            }
            points.push(EmbeddedPoint::new(index, features, label as usize, number(x_at)?, number(y_at)?));
        }
        Ok(Self::new(feature_count, points))
    }
}

/// Embeds all rows of rollout with t-SNE.
///
/// Rows are fed to t-SNE in order permuted with `config.seed`, coordinates are assigned
/// back to rows by their original index.
pub fn embed(rollout: &CompleteRollout, config: TsneConfig) -> Result<EmbeddingTable, VizError>{
    let n = rollout.len();
    let d = rollout.observation_size();
    let mut permutation: Vec<usize> = (0..n).collect();
    permutation.shuffle(&mut StdRng::seed_from_u64(config.seed));

    let mut data = Array2::<f64>::zeros((n, d));
    for (row, &index) in permutation.iter().enumerate(){
        if let Some(observation) = rollout.observation(index){
            for (j, v) in observation.iter().enumerate(){
                data[[row, j]] = *v as f64;
            }
        }
    }

    let embedded = Tsne::new(config).fit(data.view())?;
    let points = permutation.iter().enumerate().map(|(row, &index)| {
        let features = rollout.observation(index).map(|o| o.to_vec()).unwrap_or_default();
        EmbeddedPoint::new(index, features, rollout.choices()[index], embedded[[row, 0]], embedded[[row, 1]])
    }).collect();
    Ok(EmbeddingTable::new(d, points))
}
