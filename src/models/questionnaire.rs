//! Questionnaire answers and contact details submitted by end users.
//!
//! Option values are the raw strings the questionnaire sends; anything outside
//! these sets fails deserialization before reaching the intake flow.

use serde::{Deserialize, Serialize};

/// First question: what kind of problem the user has.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProblemKind {
    Trabalho,
    Divida,
    Familia,
    Imovel,
    Acidente,
}

impl ProblemKind {
    pub const ALL: [ProblemKind; 5] = [
        ProblemKind::Trabalho,
        ProblemKind::Divida,
        ProblemKind::Familia,
        ProblemKind::Imovel,
        ProblemKind::Acidente,
    ];

    /// Category label used for matching and stored on the lead.
    pub fn category(&self) -> &'static str {
        match self {
            ProblemKind::Trabalho => "trabalhista",
            ProblemKind::Divida => "consumidor",
            ProblemKind::Familia => "familia",
            ProblemKind::Imovel => "imobiliario",
            ProblemKind::Acidente => "civil",
        }
    }
}

/// Where the user stands in relation to a lawsuit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Situation {
    Orientacao,
    Processo,
    Citado,
}

impl Situation {
    pub const ALL: [Situation; 3] = [Situation::Orientacao, Situation::Processo, Situation::Citado];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Alta,
    Media,
    Baixa,
}

impl Urgency {
    pub const ALL: [Urgency; 3] = [Urgency::Alta, Urgency::Media, Urgency::Baixa];
}

/// Whether the user asked to be served by a female lawyer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenderPreference {
    Feminino,
    #[default]
    Indiferente,
}

impl GenderPreference {
    pub fn prefers_female(&self) -> bool {
        matches!(self, GenderPreference::Feminino)
    }
}

/// The full set of questionnaire answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireAnswers {
    pub problem: ProblemKind,
    pub situation: Situation,
    pub urgency: Urgency,
    #[serde(default)]
    pub gender_preference: GenderPreference,
}

/// Contact details typed in at the end of the questionnaire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub name: String,
    pub phone: String,
}

/// Request body for `POST /api/leads`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitLeadRequest {
    /// Client-generated id for this submission attempt
    pub submission_id: uuid::Uuid,
    pub contact: ContactInfo,
    pub answers: QuestionnaireAnswers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_categories() {
        let labels: Vec<&str> = ProblemKind::ALL.iter().map(|p| p.category()).collect();
        assert_eq!(
            labels,
            vec!["trabalhista", "consumidor", "familia", "imobiliario", "civil"]
        );
    }

    #[test]
    fn test_unknown_problem_is_rejected() {
        let raw = r#"{"problem":"tributario","situation":"processo","urgency":"alta"}"#;
        assert!(serde_json::from_str::<QuestionnaireAnswers>(raw).is_err());
    }

    #[test]
    fn test_gender_preference_defaults_to_indifferent() {
        let raw = r#"{"problem":"familia","situation":"citado","urgency":"baixa"}"#;
        let answers: QuestionnaireAnswers = serde_json::from_str(raw).unwrap();
        assert!(!answers.gender_preference.prefers_female());
    }
}
