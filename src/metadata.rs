/// Container-level tags written to the output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub title: String,
    pub genre: Option<String>,
    pub show: Option<String>,
    pub season_number: Option<u32>,
    pub episode_id: Option<u32>,
}

impl MetadataRecord {
    pub fn new(
        title: impl Into<String>,
        genre: Option<String>,
        show: Option<String>,
        season_number: Option<u32>,
        episode_id: Option<u32>,
    ) -> Self {
        Self {
            title: title.into(),
            genre,
            show,
            season_number,
            episode_id,
        }
    }

    /// Key/value pairs for every set field, in the order
    /// title, genre, show, season_number, episode_id.
    ///
    /// Empty strings count as unset. Numbers are kept whenever they are set,
    /// so season or episode `0` is still written.
    pub fn to_args(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let text_fields = [
            ("title", Some(self.title.as_str())),
            ("genre", self.genre.as_deref()),
            ("show", self.show.as_deref()),
        ];
        for (key, value) in text_fields {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                pairs.push((key, value.to_string()));
            }
        }
        if let Some(season) = self.season_number {
            pairs.push(("season_number", season.to_string()));
        }
        if let Some(episode) = self.episode_id {
            pairs.push(("episode_id", episode.to_string()));
        }
        pairs
    }

    /// Renders [`Self::to_args`] as repeated `-metadata key=value` options.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        self.to_args()
            .into_iter()
            .flat_map(|(key, value)| ["-metadata".to_string(), format!("{}={}", key, value)])
            .collect()
    }
}
