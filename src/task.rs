use serde::Deserialize;

/// Defaults for one tagging run, loaded from a JSON file.
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Task {
    pub output: Option<String>,
    pub genre: Option<String>,
    pub show: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl Task {
    pub fn load(path: Option<&str>) -> anyhow::Result<Option<Self>> {
        if let Some(path) = path {
            let contents = std::fs::read_to_string(path)?;
            let task: Task = serde_json::from_str(&contents)?;
            Ok(Some(task))
        } else {
            Ok(None)
        }
    }
}
