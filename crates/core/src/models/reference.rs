use serde::{Deserialize, Serialize};

/// A city plus the areas usable in filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub areas: Vec<String>,
}

/// A lifestyle/apartment tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Cities and tags bundle served by the preferences payload endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub cities: Vec<City>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// How a questionnaire question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Radio,
}

/// One question inside a questionnaire section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub title: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

/// A titled group of questionnaire questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSection {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}
