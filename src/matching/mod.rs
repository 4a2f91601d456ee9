//! Lead matching: picks the professional who receives a new lead.
//!
//! Candidates are narrowed in three tiers (exact specialty, keyword, anyone
//! eligible) and a uniform random pick is made inside the first non-empty tier.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::db::MarketplaceStore;
use crate::models::{ApprovalStatus, Professional};

/// Gender value a profile must carry to satisfy a female-lawyer preference.
pub const FEMALE_GENDER: &str = "feminino";

/// Conditions a professional must meet to receive leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityFilter {
    pub admin_email: String,
    pub female_only: bool,
}

impl EligibilityFilter {
    pub fn admits(&self, p: &Professional) -> bool {
        p.status == ApprovalStatus::Approved
            && p.subscription_active
            && p.phone.is_some()
            && !p.email.eq_ignore_ascii_case(&self.admin_email)
            && (!self.female_only || p.gender.as_deref() == Some(FEMALE_GENDER))
    }
}

/// Which tier produced the pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Exact,
    Partial,
    Fallback,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::Partial => "partial",
            MatchTier::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub professional: Professional,
    pub tier: MatchTier,
}

/// The eligibility query failed. Callers degrade to the unassigned queue.
#[derive(Debug, thiserror::Error)]
#[error("eligibility query failed: {0}")]
pub struct MatchQueryFailure(pub String);

/// Lowercase and strip diacritics so "Imobiliário" compares equal to "imobiliario",
/// whether the input arrives precomposed or decomposed.
pub fn normalize(text: &str) -> String {
    text.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Pick one candidate for `category`. Candidate order is preserved within each
/// tier, so a seeded `rng` over a fixed list always yields the same pick.
pub fn select_professional<'a, R: Rng + ?Sized>(
    candidates: &'a [Professional],
    category: &str,
    rng: &mut R,
) -> Option<(&'a Professional, MatchTier)> {
    if candidates.is_empty() {
        return None;
    }

    let wanted = normalize(category);

    let exact: Vec<&Professional> = candidates
        .iter()
        .filter(|p| normalize(&p.specialty) == wanted)
        .collect();
    if let Some(pick) = exact.choose(&mut *rng) {
        return Some((*pick, MatchTier::Exact));
    }

    let keywords: Vec<&str> = wanted.split_whitespace().collect();
    let partial: Vec<&Professional> = candidates
        .iter()
        .filter(|p| {
            let specialty = normalize(&p.specialty);
            keywords.iter().any(|k| specialty.contains(k))
        })
        .collect();
    if let Some(pick) = partial.choose(&mut *rng) {
        return Some((*pick, MatchTier::Partial));
    }

    candidates.choose(rng).map(|p| (p, MatchTier::Fallback))
}

/// Runs the eligibility query and the tiered pick with an owned random source.
pub struct MatchingEngine {
    admin_email: String,
    rng: Mutex<StdRng>,
}

impl MatchingEngine {
    pub fn new(admin_email: impl Into<String>) -> Self {
        Self {
            admin_email: admin_email.into(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic engine for tests and replays.
    pub fn with_seed(admin_email: impl Into<String>, seed: u64) -> Self {
        Self {
            admin_email: admin_email.into(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn filter(&self, prefer_female: bool) -> EligibilityFilter {
        EligibilityFilter {
            admin_email: self.admin_email.clone(),
            female_only: prefer_female,
        }
    }

    /// Find a professional for `category`, or `None` when nobody is eligible.
    pub async fn find_matching_professional<S>(
        &self,
        store: &S,
        category: &str,
        prefer_female: bool,
    ) -> Result<Option<MatchResult>, MatchQueryFailure>
    where
        S: MarketplaceStore + ?Sized,
    {
        let filter = self.filter(prefer_female);
        let candidates = store
            .eligible_professionals(&filter)
            .await
            .map_err(|e| MatchQueryFailure(e.message()))?;

        tracing::debug!(
            category,
            prefer_female,
            candidates = candidates.len(),
            "Eligible professionals loaded"
        );

        let result = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            select_professional(&candidates, category, &mut *rng).map(|(p, tier)| MatchResult {
                professional: p.clone(),
                tier,
            })
        };

        if let Some(found) = &result {
            tracing::info!(
                professional_id = %found.professional.id,
                tier = found.tier.as_str(),
                category,
                "Lead matched"
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{professional, FailingStore, MemoryStore};

    fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn test_exact_match_case_insensitive() {
        let candidates = vec![
            professional("a", "Trabalhista"),
            professional("b", "Civil"),
        ];
        for seed in 0..50 {
            let (pick, tier) =
                select_professional(&candidates, "trabalhista", &mut seeded(seed)).unwrap();
            assert_eq!(pick.id, "a");
            assert_eq!(tier, MatchTier::Exact);
        }
    }

    #[test]
    fn test_exact_tier_wins_over_partial() {
        let candidates = vec![
            professional("partial", "Direito Civil e Família"),
            professional("exact-1", "Civil"),
            professional("exact-2", "CIVIL"),
        ];
        for seed in 0..50 {
            let (pick, tier) = select_professional(&candidates, "civil", &mut seeded(seed)).unwrap();
            assert!(pick.id.starts_with("exact"));
            assert_eq!(tier, MatchTier::Exact);
        }
    }

    #[test]
    fn test_partial_keyword_with_accents() {
        let candidates = vec![professional("a", "Direito Civil e Imobiliário")];
        let (pick, tier) =
            select_professional(&candidates, "imobiliario", &mut seeded(7)).unwrap();
        assert_eq!(pick.id, "a");
        assert_eq!(tier, MatchTier::Partial);
    }

    #[test]
    fn test_partial_keyword_with_decomposed_accents() {
        let candidates = vec![
            professional("decomposed", "Direito Civil e Imobilia\u{301}rio"),
            professional("other", "Tributario"),
        ];
        assert_eq!(normalize("Imobilia\u{301}rio"), "imobiliario");
        for seed in 0..20 {
            let (pick, tier) =
                select_professional(&candidates, "imobiliario", &mut seeded(seed)).unwrap();
            assert_eq!(pick.id, "decomposed");
            assert_eq!(tier, MatchTier::Partial);
        }
    }

    #[test]
    fn test_normalize_folds_cedilla_and_tilde() {
        assert_eq!(normalize("  Ação Previdência "), "acao previdencia");
    }

    #[test]
    fn test_partial_matches_any_keyword() {
        let candidates = vec![
            professional("none", "Tributário"),
            professional("hit", "Consumidor e Bancário"),
        ];
        for seed in 0..20 {
            let (pick, tier) =
                select_professional(&candidates, "direito consumidor", &mut seeded(seed)).unwrap();
            assert_eq!(pick.id, "hit");
            assert_eq!(tier, MatchTier::Partial);
        }
    }

    #[test]
    fn test_fallback_picks_from_whole_set() {
        let candidates = vec![professional("a", "Tributário"), professional("b", "Penal")];
        let mut seen = std::collections::HashSet::new();
        for seed in 0..64 {
            let (pick, tier) = select_professional(&candidates, "familia", &mut seeded(seed)).unwrap();
            assert_eq!(tier, MatchTier::Fallback);
            seen.insert(pick.id.clone());
        }
        // Uniform pick should reach both over enough seeds
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_empty_set_returns_none() {
        assert!(select_professional(&[], "civil", &mut seeded(1)).is_none());
    }

    #[test]
    fn test_same_seed_same_pick() {
        let candidates: Vec<Professional> = (0..10)
            .map(|i| professional(&format!("p{i}"), "Civil"))
            .collect();
        let first = select_professional(&candidates, "civil", &mut seeded(42)).unwrap().0.id.clone();
        let second = select_professional(&candidates, "civil", &mut seeded(42)).unwrap().0.id.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_eligibility_filter() {
        let filter = EligibilityFilter {
            admin_email: "admin@lexmatch.com.br".to_string(),
            female_only: true,
        };

        let mut ok = professional("ok", "Civil");
        ok.gender = Some("feminino".to_string());
        assert!(filter.admits(&ok));

        let mut male = ok.clone();
        male.gender = Some("masculino".to_string());
        assert!(!filter.admits(&male));

        let mut admin = ok.clone();
        admin.email = "ADMIN@lexmatch.com.br".to_string();
        assert!(!filter.admits(&admin));

        let mut no_phone = ok.clone();
        no_phone.phone = None;
        assert!(!filter.admits(&no_phone));

        let mut lapsed = ok;
        lapsed.subscription_active = false;
        assert!(!filter.admits(&lapsed));
    }

    #[tokio::test]
    async fn test_female_preference_excluded_from_every_tier() {
        let mut exact_male = professional("exact-male", "Família");
        exact_male.gender = Some("masculino".to_string());
        let mut other_female = professional("female", "Tributário");
        other_female.gender = Some("feminino".to_string());
        let store = MemoryStore::with_professionals(vec![exact_male, other_female]);

        let engine = MatchingEngine::with_seed("admin@lexmatch.com.br", 3);
        for _ in 0..20 {
            let found = engine
                .find_matching_professional(&store, "familia", true)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(found.professional.id, "female");
            assert_eq!(found.tier, MatchTier::Fallback);
        }
    }

    #[tokio::test]
    async fn test_engine_returns_none_without_candidates() {
        let store = MemoryStore::default();
        let engine = MatchingEngine::with_seed("admin@lexmatch.com.br", 1);
        let found = engine
            .find_matching_professional(&store, "civil", false)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_match_query_failure() {
        let engine = MatchingEngine::with_seed("admin@lexmatch.com.br", 1);
        let err = engine
            .find_matching_professional(&FailingStore, "civil", false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("eligibility query failed"));
    }
}
