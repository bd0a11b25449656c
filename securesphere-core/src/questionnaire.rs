//! Questionnaire catalog loaded from CSV
//!
//! The catalog file has the headers `Dimensions, Sub-Dimensions, Questions,
//! Description, Options, Scores`. Blank cells continue the value from the
//! rows above, so one question spans one row per answer option:
//!
//! ```text
//! Dimensions,Sub-Dimensions,Questions,Description,Options,Scores
//! Governance,Governance - Policy,Is there a policy?,...,A) Not in place,1
//! ,,,,B) Ad hoc,2
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SphereError};

/// Highest score an option can carry.
pub const MAX_QUESTION_SCORE: u8 = 5;

const REQUIRED_HEADERS: [&str; 3] = ["Dimensions", "Questions", "Options"];

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "Dimensions", default)]
    dimension: String,
    #[serde(rename = "Sub-Dimensions", default)]
    sub_dimension: String,
    #[serde(rename = "Questions", default)]
    question: String,
    #[serde(rename = "Description", default)]
    description: String,
    #[serde(rename = "Options", default)]
    option: String,
    #[serde(rename = "Scores", default)]
    score: String,
}

/// One selectable answer and the score it is worth
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOption {
    pub text: String,
    pub score: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    /// 1-based position across the whole catalog
    pub number: usize,
    /// 0-based position inside its section
    pub index: usize,
    pub dimension: String,
    pub sub_dimension: Option<String>,
    pub text: String,
    pub description: String,
    pub options: Vec<AnswerOption>,
}

impl Question {
    pub fn option(&self, answer: &str) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.text == answer)
    }

    /// Best score any option of this question can reach.
    pub fn max_score(&self) -> u8 {
        self.options
            .iter()
            .filter_map(|o| o.score)
            .max()
            .unwrap_or(MAX_QUESTION_SCORE)
    }
}

/// A dimension and its questions, in file order
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub name: String,
    pub questions: Vec<Question>,
}

/// Parsed questionnaire with lookup by question text
#[derive(Debug, Clone)]
pub struct Questionnaire {
    sections: Vec<Section>,
    by_text: HashMap<String, (usize, usize)>,
}

impl Questionnaire {
    /// Load the catalog from a CSV file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        match Self::from_reader(file) {
            Err(SphereError::EmptyCatalog { .. }) => Err(SphereError::EmptyCatalog {
                path: path.to_path_buf(),
            }),
            other => other,
        }
    }

    /// Parse the catalog from any CSV source.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv.headers()?.clone();
        for required in REQUIRED_HEADERS {
            if !headers.iter().any(|h| h == required) {
                return Err(SphereError::catalog(0, format!("missing '{}' column", required)));
            }
        }

        let mut builder = CatalogBuilder::default();
        for (idx, record) in csv.deserialize::<CatalogRow>().enumerate() {
            builder.push(idx + 1, record?)?;
        }
        builder.finish()
    }

    /// Dimensions in file order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, idx: usize) -> Option<&Section> {
        self.sections.get(idx)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    pub fn section_index(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn total_questions(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections.iter().flat_map(|s| s.questions.iter())
    }

    pub fn find_question(&self, text: &str) -> Option<&Question> {
        self.by_text
            .get(text)
            .map(|&(s, q)| &self.sections[s].questions[q])
    }

    pub fn question_number(&self, text: &str) -> Option<usize> {
        self.find_question(text).map(|q| q.number)
    }

    pub fn sub_dimension_of(&self, text: &str) -> Option<&str> {
        self.find_question(text)
            .and_then(|q| q.sub_dimension.as_deref())
    }

    /// Score (1-5) for an answer to a question.
    ///
    /// Uses the option's score from the catalog. When the question or the
    /// option is unknown, or the option has no score, falls back to the
    /// option letter (`A)` = 1 .. `E)` = 5), and to 1 for anything else.
    pub fn score_answer(&self, question: &str, answer: &str) -> u8 {
        self.find_question(question)
            .and_then(|q| q.option(answer))
            .and_then(|o| o.score)
            .unwrap_or_else(|| letter_score(answer))
    }

    /// Maximum reachable score for a question (5 for unknown questions).
    pub fn max_score(&self, question: &str) -> u8 {
        self.find_question(question)
            .map(Question::max_score)
            .unwrap_or(MAX_QUESTION_SCORE)
    }

    /// Check that `answer` is one of the options of `question`.
    pub fn validate_answer<'a>(&'a self, question: &str, answer: &str) -> Result<&'a AnswerOption> {
        self.find_question(question)
            .and_then(|q| q.option(answer))
            .ok_or_else(|| SphereError::unknown_option(question, answer))
    }
}

/// Score implied by an option's letter prefix.
pub fn letter_score(answer: &str) -> u8 {
    match answer.as_bytes() {
        [b'A', b')', ..] => 1,
        [b'B', b')', ..] => 2,
        [b'C', b')', ..] => 3,
        [b'D', b')', ..] => 4,
        [b'E', b')', ..] => 5,
        _ => 1,
    }
}

#[derive(Default)]
struct CatalogBuilder {
    sections: Vec<Section>,
    /// Section the following questions belong to
    current_section: Option<usize>,
    current_sub: Option<String>,
    current: Option<Question>,
    numbered: usize,
}

impl CatalogBuilder {
    fn push(&mut self, row: usize, r: CatalogRow) -> Result<()> {
        if !r.dimension.is_empty() {
            self.flush_question();
            let idx = match self.sections.iter().position(|s| s.name == r.dimension) {
                Some(idx) => idx,
                None => {
                    self.sections.push(Section {
                        name: r.dimension.clone(),
                        questions: Vec::new(),
                    });
                    self.sections.len() - 1
                }
            };
            self.current_section = Some(idx);
            self.current_sub = None;
        }
        if !r.sub_dimension.is_empty() {
            self.current_sub = Some(r.sub_dimension.clone());
        }

        if !r.question.is_empty() {
            self.flush_question();
            let section = self
                .current_section
                .and_then(|idx| self.sections.get(idx))
                .ok_or_else(|| SphereError::catalog(row, "question before any dimension"))?;
            self.numbered += 1;
            self.current = Some(Question {
                number: self.numbered,
                index: section.questions.len(),
                dimension: section.name.clone(),
                sub_dimension: self.current_sub.clone(),
                text: r.question,
                description: r.description,
                options: Vec::new(),
            });
        }

        if !r.option.is_empty() {
            let question = self
                .current
                .as_mut()
                .ok_or_else(|| SphereError::catalog(row, "option before any question"))?;
            let score = parse_score(row, &r.score)?;
            question.options.push(AnswerOption {
                text: r.option,
                score,
            });
        }
        Ok(())
    }

    fn flush_question(&mut self) {
        if let Some(question) = self.current.take() {
            if let Some(section) = self.sections.iter_mut().find(|s| s.name == question.dimension) {
                section.questions.push(question);
            }
        }
    }

    fn finish(mut self) -> Result<Questionnaire> {
        self.flush_question();
        self.sections.retain(|s| !s.questions.is_empty());
        if self.sections.is_empty() {
            return Err(SphereError::EmptyCatalog {
                path: Default::default(),
            });
        }

        let mut by_text = HashMap::new();
        for (s, section) in self.sections.iter().enumerate() {
            for (q, question) in section.questions.iter().enumerate() {
                if by_text.insert(question.text.clone(), (s, q)).is_some() {
                    return Err(SphereError::catalog(
                        question.number,
                        format!("duplicate question '{}'", question.text),
                    ));
                }
            }
        }

        Ok(Questionnaire {
            sections: self.sections,
            by_text,
        })
    }
}

fn parse_score(row: usize, raw: &str) -> Result<Option<u8>> {
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<u8>() {
        Ok(score) if (1..=MAX_QUESTION_SCORE).contains(&score) => Ok(Some(score)),
        Ok(score) => Err(SphereError::catalog(
            row,
            format!("score {} outside 1..={}", score, MAX_QUESTION_SCORE),
        )),
        // Non-numeric score cells are treated as unscored options
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = "\
Dimensions,Sub-Dimensions,Questions,Description,Options,Scores
Governance,Governance - Policy,Is there a policy?,Written policy,A) None,1
,,,,B) Draft,2
,,,,C) Published,3
,Governance - Training,Is training given?,Secure coding,A) Never,1
,,,,B) Yearly,3
,,,,E) Continuous,5
Access Control,Access Control - Authentication,Is MFA enforced?,Admins,A) No,1
,,,,D) Mostly,
,,,,E) Always,5
";

    pub(crate) fn sample() -> Questionnaire {
        Questionnaire::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn parses_sections_in_order() {
        let q = sample();
        let names: Vec<_> = q.section_names().collect();
        assert_eq!(names, vec!["Governance", "Access Control"]);
        assert_eq!(q.total_questions(), 3);
        assert_eq!(q.section(0).unwrap().questions.len(), 2);
    }

    #[test]
    fn numbers_questions_sequentially() {
        let q = sample();
        assert_eq!(q.question_number("Is there a policy?"), Some(1));
        assert_eq!(q.question_number("Is training given?"), Some(2));
        assert_eq!(q.question_number("Is MFA enforced?"), Some(3));
        assert_eq!(q.find_question("Is MFA enforced?").unwrap().index, 0);
    }

    #[test]
    fn tracks_sub_dimensions() {
        let q = sample();
        assert_eq!(q.sub_dimension_of("Is training given?"), Some("Governance - Training"));
        assert_eq!(
            q.sub_dimension_of("Is MFA enforced?"),
            Some("Access Control - Authentication")
        );
    }

    #[test]
    fn scores_from_table() {
        let q = sample();
        assert_eq!(q.score_answer("Is training given?", "B) Yearly"), 3);
        assert_eq!(q.score_answer("Is there a policy?", "C) Published"), 3);
    }

    #[test]
    fn falls_back_to_option_letter() {
        let q = sample();
        // option exists but carries no score
        assert_eq!(q.score_answer("Is MFA enforced?", "D) Mostly"), 4);
        // unknown question
        assert_eq!(q.score_answer("Unknown?", "E) Whatever"), 5);
        assert_eq!(q.score_answer("Unknown?", "yes"), 1);
    }

    #[test]
    fn max_score_uses_best_option() {
        let q = sample();
        assert_eq!(q.max_score("Is there a policy?"), 3);
        assert_eq!(q.max_score("Is training given?"), 5);
        assert_eq!(q.max_score("missing"), 5);
    }

    #[test]
    fn validates_answers() {
        let q = sample();
        assert!(q.validate_answer("Is there a policy?", "B) Draft").is_ok());
        assert!(matches!(
            q.validate_answer("Is there a policy?", "Z) Nope"),
            Err(SphereError::UnknownOption { .. })
        ));
    }

    #[test]
    fn repeated_dimension_continues_its_section() {
        let csv = "\
Dimensions,Sub-Dimensions,Questions,Description,Options,Scores
Governance,,Is there a policy?,,A) None,1
Identity,,Is MFA enforced?,,A) No,1
Governance,,Is there an owner?,,A) No,1
,,Is the policy reviewed?,,A) Never,1
";
        let q = Questionnaire::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(q.section_count(), 2);

        let owner = q.find_question("Is there an owner?").unwrap();
        assert_eq!(owner.dimension, "Governance");
        assert_eq!(owner.index, 1);
        let reviewed = q.find_question("Is the policy reviewed?").unwrap();
        assert_eq!(reviewed.dimension, "Governance");
        assert_eq!(reviewed.index, 2);

        assert_eq!(q.section(0).unwrap().questions.len(), 3);
        assert_eq!(q.section(1).unwrap().questions.len(), 1);
    }

    #[test]
    fn rejects_missing_header() {
        let err = Questionnaire::from_reader("Dimensions,Options\nA,B\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Questions"));
    }

    #[test]
    fn rejects_option_before_question() {
        let csv = "Dimensions,Questions,Options\nGov,,A) x\n";
        let err = Questionnaire::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, SphereError::Catalog { row: 1, .. }));
    }

    #[test]
    fn rejects_empty_catalog() {
        let csv = "Dimensions,Questions,Options\n";
        assert!(matches!(
            Questionnaire::from_reader(csv.as_bytes()),
            Err(SphereError::EmptyCatalog { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_score() {
        let csv = "Dimensions,Questions,Options,Scores\nGov,Q?,A) x,9\n";
        assert!(matches!(
            Questionnaire::from_reader(csv.as_bytes()),
            Err(SphereError::Catalog { .. })
        ));
    }

    #[test]
    fn letter_scores() {
        assert_eq!(letter_score("A) x"), 1);
        assert_eq!(letter_score("C) x"), 3);
        assert_eq!(letter_score("E)"), 5);
        assert_eq!(letter_score("F) x"), 1);
        assert_eq!(letter_score(""), 1);
    }

    #[test]
    fn loads_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let q = Questionnaire::from_path(file.path()).unwrap();
        assert_eq!(q.section_count(), 2);
    }
}
