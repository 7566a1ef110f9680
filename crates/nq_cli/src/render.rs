use nq_core::ScoredCandidate;
use nq_inference::pipeline::{Response, Status};
use nq_storage::scoring::newest_first;

/// Source list shown under an answer, newest article first.
pub fn format_sources(sources: &[ScoredCandidate]) -> String {
    let mut sorted: Vec<&ScoredCandidate> = sources.iter().collect();
    sorted.sort_by(|a, b| newest_first(a.article.published_at, b.article.published_at));

    let mut out = String::new();
    for candidate in sorted {
        let article = &candidate.article;
        let date = article.display_date().unwrap_or_else(|| "date inconnue".to_string());
        let title = if article.title.is_empty() { "Sans titre" } else { article.title.as_str() };
        out.push_str(&format!("📰 {} - {} (score {})\n", date, title, candidate.score));
        if let Some(url) = &article.url {
            out.push_str(&format!("   {}\n", url));
        }
    }
    out
}

pub fn print_response(response: &Response) {
    match &response.status {
        Status::SearchUnavailable(message) => eprintln!("⚠️  Recherche indisponible : {}", message),
        Status::CompletionFailed(message) => eprintln!("⚠️  Génération impossible : {}", message),
        Status::Answered | Status::NoCandidates => {}
    }

    println!("\n{}\n", response.answer);
    if !response.sources.is_empty() {
        println!("Articles sources :");
        print!("{}", format_sources(&response.sources));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use nq_core::ArticleRecord;

    #[test]
    fn test_sources_listed_newest_first() {
        let sources = vec![
            ScoredCandidate::new(
                ArticleRecord::new("Ancien", "").with_date(NaiveDate::from_ymd_opt(2021, 5, 3).unwrap()),
                3.0,
            ),
            ScoredCandidate::new(ArticleRecord::new("", "").with_url("https://medias24.com/x"), 1.0),
            ScoredCandidate::new(
                ArticleRecord::new("Récent", "").with_date(NaiveDate::from_ymd_opt(2023, 1, 9).unwrap()),
                2.0,
            ),
        ];

        let text = format_sources(&sources);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "📰 09/01/2023 - Récent (score 2)");
        assert_eq!(lines[1], "📰 03/05/2021 - Ancien (score 3)");
        assert_eq!(lines[2], "📰 date inconnue - Sans titre (score 1)");
        assert_eq!(lines[3], "   https://medias24.com/x");
    }
}
