//! Lead submission: turns questionnaire answers into a matched, stored lead.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::db::MarketplaceStore;
use crate::errors::AppError;
use crate::matching::{MatchTier, MatchingEngine};
use crate::models::{
    ContactInfo, Lead, MatchedProfessional, NewLead, ProblemKind, QuestionnaireAnswers, Situation,
    Urgency, SENTINEL_PROFESSIONAL_ID,
};

/// Shown to the end user when the lead lands in the unassigned queue.
pub const NO_PROFESSIONAL_NOTICE: &str =
    "No momento não há advogados disponíveis para o seu caso. Nossa equipe entrará em contato em breve.";

const MAX_NAME_LEN: usize = 120;

/// Result of a submission, shaped for the questionnaire result screen.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub lead: Lead,
    pub matched_professional: Option<MatchedProfessional>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_tier: Option<MatchTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("{0}")]
    Invalid(String),
    #[error("Sua solicitação já está sendo enviada.")]
    InFlight,
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<SubmissionError> for AppError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Invalid(msg) => AppError::Validation(msg),
            SubmissionError::InFlight => {
                AppError::Conflict(SubmissionError::InFlight.to_string())
            }
            SubmissionError::Store(inner) => inner,
        }
    }
}

fn situation_clause(situation: Situation) -> &'static str {
    match situation {
        Situation::Orientacao => "gostaria de receber orientação jurídica sobre",
        Situation::Processo => "desejo entrar com um processo relacionado a",
        Situation::Citado => "fui citado(a) em um processo relacionado a",
    }
}

fn category_phrase(problem: ProblemKind) -> &'static str {
    match problem {
        ProblemKind::Trabalho => "uma questão trabalhista",
        ProblemKind::Divida => "dívidas ou problemas de consumo",
        ProblemKind::Familia => "uma questão familiar",
        ProblemKind::Imovel => "uma questão imobiliária",
        ProblemKind::Acidente => "um acidente ou pedido de indenização",
    }
}

fn urgency_phrase(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Alta => "muito urgente",
        Urgency::Media => "urgente",
        Urgency::Baixa => "não urgente",
    }
}

/// Message the professional receives, built from the answers.
pub fn compose_message(contact: &ContactInfo, answers: &QuestionnaireAnswers) -> String {
    format!(
        "Olá, meu nome é {} e {} {}. Considero meu caso {}. Aguardo seu contato.",
        contact.name.trim(),
        situation_clause(answers.situation),
        category_phrase(answers.problem),
        urgency_phrase(answers.urgency),
    )
}

/// Trim the name and reduce the phone to digits.
pub fn validate_contact(contact: &ContactInfo) -> Result<ContactInfo, SubmissionError> {
    let name = contact.name.trim();
    if name.is_empty() {
        return Err(SubmissionError::Invalid("Informe seu nome.".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(SubmissionError::Invalid("Nome muito longo.".to_string()));
    }

    let phone: String = contact.phone.chars().filter(char::is_ascii_digit).collect();
    if !(10..=13).contains(&phone.len()) {
        return Err(SubmissionError::Invalid(
            "Informe um telefone válido com DDD.".to_string(),
        ));
    }

    Ok(ContactInfo {
        name: name.to_string(),
        phone,
    })
}

/// Removes the submission id from the in-flight set when the attempt ends.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<String>>,
    key: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|p| p.into_inner());
        set.remove(&self.key);
    }
}

/// Orchestrates category resolution, matching and the single lead write.
pub struct LeadIntake<S: ?Sized> {
    engine: Arc<MatchingEngine>,
    in_flight: Mutex<HashSet<String>>,
    store: Arc<S>,
}

impl<S> LeadIntake<S>
where
    S: MarketplaceStore + ?Sized,
{
    pub fn new(store: Arc<S>, engine: Arc<MatchingEngine>) -> Self {
        Self {
            engine,
            in_flight: Mutex::new(HashSet::new()),
            store,
        }
    }

    fn begin(&self, submission_id: &str) -> Result<InFlight<'_>, SubmissionError> {
        let mut set = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        if !set.insert(submission_id.to_string()) {
            return Err(SubmissionError::InFlight);
        }
        Ok(InFlight {
            set: &self.in_flight,
            key: submission_id.to_string(),
        })
    }

    /// Submit a lead. At most one row is ever written per `submission_id`:
    /// concurrent duplicates are rejected and completed ones are replayed.
    pub async fn submit_lead(
        &self,
        submission_id: &str,
        contact: &ContactInfo,
        answers: &QuestionnaireAnswers,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let contact = validate_contact(contact)?;
        let _guard = self.begin(submission_id)?;

        if let Some(existing) = self.store.find_lead_by_submission(submission_id).await? {
            tracing::info!(lead_id = %existing.id, submission_id, "Replaying completed submission");
            return self.replay(existing).await;
        }

        let category = answers.problem.category();
        let description = compose_message(&contact, answers);

        let matched = match self
            .engine
            .find_matching_professional(
                &*self.store,
                category,
                answers.gender_preference.prefers_female(),
            )
            .await
        {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(error = %err, category, "Matching failed, routing lead to unassigned queue");
                None
            }
        };

        let owner = matched
            .as_ref()
            .map(|m| m.professional.id.clone())
            .unwrap_or_else(|| SENTINEL_PROFESSIONAL_ID.to_string());

        let lead = self
            .store
            .insert_lead(&NewLead {
                professional_id: owner,
                client_name: contact.name.clone(),
                client_email: None,
                client_phone: contact.phone.clone(),
                category: category.to_string(),
                description,
                submission_id: Some(submission_id.to_string()),
            })
            .await?;

        tracing::info!(
            lead_id = %lead.id,
            professional_id = %lead.professional_id,
            category,
            "Lead created"
        );

        let notice = matched
            .is_none()
            .then(|| NO_PROFESSIONAL_NOTICE.to_string());

        Ok(SubmissionOutcome {
            lead,
            matched_professional: matched.as_ref().map(|m| (&m.professional).into()),
            match_tier: matched.map(|m| m.tier),
            notice,
        })
    }

    async fn replay(&self, lead: Lead) -> Result<SubmissionOutcome, SubmissionError> {
        if lead.is_unassigned() {
            return Ok(SubmissionOutcome {
                lead,
                matched_professional: None,
                match_tier: None,
                notice: Some(NO_PROFESSIONAL_NOTICE.to_string()),
            });
        }

        let professional = self.store.get_professional(&lead.professional_id).await?;
        Ok(SubmissionOutcome {
            matched_professional: professional.as_ref().map(MatchedProfessional::from),
            lead,
            match_tier: None,
            notice: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenderPreference, LeadStatus};
    use crate::testing::{professional, MemoryStore};
    use std::time::Duration;

    const ADMIN: &str = "admin@lexmatch.com.br";

    fn intake(store: MemoryStore) -> (LeadIntake<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(store);
        let engine = Arc::new(MatchingEngine::with_seed(ADMIN, 11));
        (LeadIntake::new(store.clone(), engine), store)
    }

    fn ana() -> ContactInfo {
        ContactInfo {
            name: "Ana".to_string(),
            phone: "11999999999".to_string(),
        }
    }

    fn answers(problem: ProblemKind) -> QuestionnaireAnswers {
        QuestionnaireAnswers {
            problem,
            situation: Situation::Processo,
            urgency: Urgency::Alta,
            gender_preference: GenderPreference::Indiferente,
        }
    }

    #[test]
    fn test_message_for_family_lawsuit() {
        let message = compose_message(&ana(), &answers(ProblemKind::Familia));
        assert!(message.contains("muito urgente"));
        assert!(message
            .contains("desejo entrar com um processo relacionado a uma questão familiar"));
        assert!(message.starts_with("Olá, meu nome é Ana"));
    }

    #[test]
    fn test_urgency_phrases() {
        let mut a = answers(ProblemKind::Trabalho);
        a.urgency = Urgency::Media;
        assert!(compose_message(&ana(), &a).contains("Considero meu caso urgente."));
        a.urgency = Urgency::Baixa;
        assert!(compose_message(&ana(), &a).contains("não urgente"));
    }

    #[test]
    fn test_contact_validation() {
        let ok = validate_contact(&ContactInfo {
            name: "  Ana  ".to_string(),
            phone: "(11) 99999-9999".to_string(),
        })
        .unwrap();
        assert_eq!(ok.name, "Ana");
        assert_eq!(ok.phone, "11999999999");

        assert!(validate_contact(&ContactInfo {
            name: " ".to_string(),
            phone: "11999999999".to_string(),
        })
        .is_err());
        assert!(validate_contact(&ContactInfo {
            name: "Ana".to_string(),
            phone: "9999".to_string(),
        })
        .is_err());
    }

    #[tokio::test]
    async fn test_matched_submission_owned_by_professional() {
        let mut family = professional("fam", "Família");
        family.gender = Some("feminino".to_string());
        let (intake, store) = intake(MemoryStore::with_professionals(vec![
            family,
            professional("civ", "Civil"),
        ]));

        let outcome = intake
            .submit_lead("s-1", &ana(), &answers(ProblemKind::Familia))
            .await
            .unwrap();

        assert_eq!(outcome.lead.professional_id, "fam");
        assert_eq!(outcome.lead.status, LeadStatus::Pending);
        assert_eq!(outcome.lead.category, "familia");
        assert!(outcome.lead.client_email.is_none());
        assert_eq!(outcome.match_tier, Some(MatchTier::Exact));
        assert!(outcome.notice.is_none());
        assert_eq!(outcome.matched_professional.unwrap().id, "fam");
        assert_eq!(store.lead_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_pool_goes_to_sentinel() {
        let (intake, store) = intake(MemoryStore::default());

        let outcome = intake
            .submit_lead("s-1", &ana(), &answers(ProblemKind::Imovel))
            .await
            .unwrap();

        assert_eq!(outcome.lead.professional_id, SENTINEL_PROFESSIONAL_ID);
        assert_eq!(outcome.lead.status, LeadStatus::Pending);
        assert!(outcome.matched_professional.is_none());
        assert_eq!(outcome.notice.as_deref(), Some(NO_PROFESSIONAL_NOTICE));
        assert_eq!(store.lead_count(), 1);
    }

    #[tokio::test]
    async fn test_match_failure_degrades_to_sentinel() {
        let (intake, store) = intake(MemoryStore {
            fail_eligibility: true,
            ..MemoryStore::with_professionals(vec![professional("a", "Civil")])
        });

        let outcome = intake
            .submit_lead("s-1", &ana(), &answers(ProblemKind::Acidente))
            .await
            .unwrap();

        assert!(outcome.lead.is_unassigned());
        assert_eq!(store.lead_count(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_leaves_nothing_and_allows_retry() {
        let (intake, store) = intake(MemoryStore {
            fail_insert: true,
            ..Default::default()
        });

        let err = intake
            .submit_lead("s-1", &ana(), &answers(ProblemKind::Divida))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Store(AppError::Database(_))));
        assert_eq!(store.lead_count(), 0);

        // The in-flight marker was released, so a retry is not reported as a duplicate
        let again = intake
            .submit_lead("s-1", &ana(), &answers(ProblemKind::Divida))
            .await
            .unwrap_err();
        assert!(matches!(again, SubmissionError::Store(_)));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_creates_one_lead() {
        let (intake, store) = intake(MemoryStore {
            insert_delay: Some(Duration::from_millis(50)),
            ..MemoryStore::with_professionals(vec![professional("a", "Civil")])
        });

        let contact = ana();
        let a = answers(ProblemKind::Acidente);
        let (first, second) = tokio::join!(
            intake.submit_lead("same", &contact, &a),
            intake.submit_lead("same", &contact, &a),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(SubmissionError::InFlight))));
        assert_eq!(store.lead_count(), 1);
    }

    #[tokio::test]
    async fn test_completed_submission_is_replayed() {
        let (intake, store) = intake(MemoryStore::with_professionals(vec![professional(
            "a", "Civil",
        )]));

        let first = intake
            .submit_lead("s-9", &ana(), &answers(ProblemKind::Acidente))
            .await
            .unwrap();
        let second = intake
            .submit_lead("s-9", &ana(), &answers(ProblemKind::Acidente))
            .await
            .unwrap();

        assert_eq!(first.lead.id, second.lead.id);
        assert_eq!(second.matched_professional.unwrap().id, "a");
        assert_eq!(store.lead_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_contact_never_touches_store() {
        let (intake, store) = intake(MemoryStore::default());
        let err = intake
            .submit_lead(
                "s-1",
                &ContactInfo {
                    name: String::new(),
                    phone: "11999999999".to_string(),
                },
                &answers(ProblemKind::Familia),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Invalid(_)));
        assert_eq!(store.lead_count(), 0);
    }
}
