//! Rendering of retrieved articles into the text sent to the completion
//! backend.
//!
//! The rendered text only ever contains the candidates it was given and
//! always finishes with the instruction telling the model to stay within
//! those articles.

use nq_core::{GenerationParams, ScoredCandidate};
use nq_storage::scoring::oldest_first;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const NO_RELEVANT_ARTICLES: &str =
    "Je n'ai pas trouvé d'articles pertinents pour répondre à votre question.";

pub const APOLOGY: &str = "Désolé, je n'ai pas pu générer de réponse pour le moment. Veuillez réessayer.";

pub const FLAT_PERSONA: &str = "Vous êtes l'Assistant Médias 24, spécialisé dans l'actualité marocaine. \
Répondez aux questions en vous basant uniquement sur les articles fournis. \
Si les articles ne contiennent pas assez d'informations, dites-le clairement.";

pub const CHRONOLOGICAL_PERSONA: &str = "Tu es un expert en analyse d'articles d'actualité. \
Tu dois produire des synthèses chronologiques détaillées en français, \
en mettant en évidence l'évolution des événements dans le temps.";

const FLAT_HEADER: &str = "Articles pertinents:";
const FLAT_INSTRUCTION: &str =
    "Répondez à la question en vous basant uniquement sur les articles fournis.";

const CHRONOLOGICAL_HEADER: &str = "Articles à synthétiser, du plus ancien au plus récent :";
const CHRONOLOGICAL_INSTRUCTION: &str = "Fais une synthèse chronologique détaillée de ces articles, \
en te basant uniquement sur leur contenu. Pour chaque période importante :
1. Indique clairement la date
2. Résume les événements marquants
3. Mets en évidence l'évolution du sujet dans le temps
4. Termine par une conclusion sur l'évolution globale du sujet";

pub const SUMMARY_PERSONA: &str = "Tu es un expert en analyse d'articles d'actualité. \
Tu dois produire des synthèses claires, objectives et bien structurées en français.";

const SUMMARY_HEADER: &str = "Voici plusieurs articles d'actualité. Fais-en une synthèse claire et concise en français :";
const SUMMARY_INSTRUCTION: &str = "Fais une synthèse claire et concise de ces articles, \
en te basant uniquement sur leur contenu.";

const KEYWORD_PERSONA: &str = "Tu extrais les mots-clés de recherche d'une question. \
Réponds uniquement par les mots-clés, séparés par des espaces, sans ponctuation.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyMode {
    /// Articles in relevance order followed by the question
    #[default]
    Flat,
    /// Articles in publication order with a time-line synthesis request
    Chronological,
    /// Articles with their relative relevance and a plain summary request
    Summary,
}

impl AssemblyMode {
    pub fn persona(&self) -> &'static str {
        match self {
            Self::Flat => FLAT_PERSONA,
            Self::Chronological => CHRONOLOGICAL_PERSONA,
            Self::Summary => SUMMARY_PERSONA,
        }
    }

    pub fn params(&self) -> GenerationParams {
        match self {
            Self::Flat => GenerationParams { max_tokens: 500, temperature: 0.7 },
            Self::Chronological => GenerationParams { max_tokens: 1500, temperature: 0.7 },
            Self::Summary => GenerationParams { max_tokens: 1000, temperature: 0.7 },
        }
    }
}

impl FromStr for AssemblyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "chronological" | "chrono" => Ok(Self::Chronological),
            "summary" | "résumé" | "resume" => Ok(Self::Summary),
            other => Err(format!("unknown mode '{}', expected 'flat', 'chronological' or 'summary'", other)),
        }
    }
}

impl fmt::Display for AssemblyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::Chronological => write!(f, "chronological"),
            Self::Summary => write!(f, "summary"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// Nothing scored above zero; no completion request must be made
    NoCandidates,
    Prompt(String),
}

impl Assembly {
    pub fn text(&self) -> &str {
        match self {
            Self::NoCandidates => NO_RELEVANT_ARTICLES,
            Self::Prompt(prompt) => prompt,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::NoCandidates)
    }
}

pub fn assemble(candidates: &[ScoredCandidate], query: &str, mode: AssemblyMode) -> Assembly {
    let mut selected: Vec<&ScoredCandidate> = candidates.iter().filter(|c| c.score > 0.0).collect();
    if selected.is_empty() {
        return Assembly::NoCandidates;
    }

    let prompt = match mode {
        AssemblyMode::Flat => render_flat(&selected, query),
        AssemblyMode::Chronological => {
            selected.sort_by(|a, b| oldest_first(a.article.published_at, b.article.published_at));
            render_chronological(&selected, query)
        }
        AssemblyMode::Summary => render_summary(&selected, query),
    };
    Assembly::Prompt(prompt)
}

fn render_flat(selected: &[&ScoredCandidate], query: &str) -> String {
    let mut out = format!("{}\n\n", FLAT_HEADER);
    for candidate in selected {
        let article = &candidate.article;
        out.push_str(&format!("Titre: {}\n", article.title));
        if let Some(date) = article.display_date() {
            out.push_str(&format!("Date: {}\n", date));
        }
        if let Some(url) = &article.url {
            out.push_str(&format!("Source: {}\n", url));
        }
        out.push_str(&format!("Contenu: {}\n\n", article.body));
    }
    out.push_str(&format!("Question: {}\n\n", query));
    out.push_str(FLAT_INSTRUCTION);
    out
}

fn render_chronological(selected: &[&ScoredCandidate], query: &str) -> String {
    let mut out = format!("{}\n\n", CHRONOLOGICAL_HEADER);
    for candidate in selected {
        let article = &candidate.article;
        let date = article.display_date().unwrap_or_else(|| "date inconnue".to_string());
        out.push_str(&format!("Date: {}\n", date));
        out.push_str(&format!("Titre: {}\n", article.title));
        out.push_str(&format!("Contenu: {}\n\n", article.body));
    }
    out.push_str(&format!("Sujet: {}\n\n", query));
    out.push_str(CHRONOLOGICAL_INSTRUCTION);
    out
}

/// Relevance is shown as a share of the best score in the set, so keyword
/// counts and remote index scores read the same way.
fn render_summary(selected: &[&ScoredCandidate], query: &str) -> String {
    let best = selected.iter().map(|c| c.score).fold(f32::MIN, f32::max);
    let mut out = format!("{}\n\n", SUMMARY_HEADER);
    for candidate in selected {
        let article = &candidate.article;
        out.push_str(&format!("Article (pertinence {:.2}%):\n", candidate.score / best * 100.0));
        out.push_str(&format!("Titre: {}\n", article.title));
        out.push_str(&format!("Contenu: {}\n\n", article.body));
    }
    out.push_str(&format!("Sujet: {}\n\n", query));
    out.push_str(SUMMARY_INSTRUCTION);
    out
}

/// Persona and user message asking the model to reduce a question to
/// search keywords.
pub fn keyword_prompt(question: &str) -> (&'static str, String) {
    (KEYWORD_PERSONA, format!("Question : {}\n\nMots-clés :", question))
}
