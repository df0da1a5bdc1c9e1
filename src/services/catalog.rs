use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::{
    error::AppResult,
    models::{Joke, JokeId},
};

/// Static table of jokes, kept in file order
#[derive(Debug, Clone, Default)]
pub struct JokeCatalog {
    jokes: Vec<Joke>,
    index: HashMap<JokeId, usize>,
}

impl JokeCatalog {
    pub fn new(jokes: impl IntoIterator<Item = Joke>) -> Self {
        let mut catalog = Self::default();
        for joke in jokes {
            if catalog.index.contains_key(&joke.joke_id) {
                tracing::warn!(joke_id = joke.joke_id, "Duplicate joke id, keeping first");
                continue;
            }
            catalog.index.insert(joke.joke_id, catalog.jokes.len());
            catalog.jokes.push(joke);
        }
        catalog
    }

    /// Loads a `joke_id,joke_text` CSV file with a header row
    pub async fn from_csv_path(path: &Path) -> AppResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_csv_reader(bytes.as_slice())
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> AppResult<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let jokes = reader
            .deserialize::<Joke>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(jokes))
    }

    pub fn get(&self, joke_id: JokeId) -> Option<&Joke> {
        self.index.get(&joke_id).map(|&i| &self.jokes[i])
    }

    /// Jokes in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &Joke> {
        self.jokes.iter()
    }

    pub fn len(&self) -> usize {
        self.jokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jokes.is_empty()
    }
}
