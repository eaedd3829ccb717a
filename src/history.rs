use std::{fs::File, path::Path};

use polars::{
    frame::DataFrame,
    io::SerWriter,
    prelude::{Column, CsvWriter, NamedFrom},
};
use serde::Serialize;

use crate::error::Result;

/// Summary of one finished training episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeRecord {
    pub episode: usize,
    pub steps: usize,
    pub episode_return: f64,
    /// Mean return over the rolling score window, this episode included
    pub mean_return: f64,
    pub epsilon: f64,
    /// `None` when the replay update was skipped
    pub loss: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    records: Vec<EpisodeRecord>,
}

impl TrainingHistory {
    pub fn push(&mut self, record: EpisodeRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[EpisodeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&EpisodeRecord> {
        self.records.last()
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let episodes: Vec<u32> = self.records.iter().map(|r| r.episode as u32).collect();
        let steps: Vec<u32> = self.records.iter().map(|r| r.steps as u32).collect();
        let returns: Vec<f64> = self.records.iter().map(|r| r.episode_return).collect();
        let means: Vec<f64> = self.records.iter().map(|r| r.mean_return).collect();
        let epsilons: Vec<f64> = self.records.iter().map(|r| r.epsilon).collect();
        let losses: Vec<Option<f32>> = self.records.iter().map(|r| r.loss).collect();

        Ok(DataFrame::new(vec![
            Column::new("episode".into(), episodes),
            Column::new("steps".into(), steps),
            Column::new("return".into(), returns),
            Column::new("mean_return".into(), means),
            Column::new("epsilon".into(), epsilons),
            Column::new("loss".into(), losses),
        ])?)
    }

    /// Write the history as CSV, creating parent directories as needed.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).finish(&mut df)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(n: usize) -> TrainingHistory {
        let mut history = TrainingHistory::default();
        for episode in 0..n {
            history.push(EpisodeRecord {
                episode,
                steps: 10 + episode,
                episode_return: (10 + episode) as f64,
                mean_return: 10.0,
                epsilon: 1.0,
                loss: (episode > 0).then_some(0.5),
            });
        }
        history
    }

    #[test]
    fn dataframe_has_one_row_per_episode() {
        let df = history(4).to_dataframe().unwrap();
        assert_eq!(df.height(), 4);
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["episode", "steps", "return", "mean_return", "epsilon", "loss"]
        );
    }

    #[test]
    fn csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.csv");
        history(3).write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("episode,steps,return"));
    }
}
