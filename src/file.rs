use serde::Serialize;

/// Information about a run, stored alongside its statistics.
#[derive(Serialize, Default, Debug)]
pub struct RunMetadata {
    pub umicollapse_version: String,
    pub command: String,
    pub inputs: Vec<String>,
    pub start_date: String,
    pub elapsed: f64,
}

impl RunMetadata {
    pub fn new(command: &str, inputs: &[&str]) -> Self {
        RunMetadata {
            umicollapse_version: crate::cli::VERSION.to_string(),
            command: command.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            start_date: format!("{:?}", chrono::offset::Local::now()),
            elapsed: 0.0,
        }
    }
}
