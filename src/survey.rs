//! Survey answer validation for a project's questionnaire.

use std::collections::HashMap;

use thiserror::Error;

use crate::models::{Question, QuestionType};

pub const RATING_MIN: u8 = 1;
pub const RATING_MAX: u8 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum SurveyError {
    #[error("Please answer all questions before submitting.")]
    Incomplete,
    #[error("\"{label}\" needs a rating from 1 to 5")]
    InvalidRating { label: String },
    #[error("\"{answer}\" is not an option for \"{label}\"")]
    InvalidChoice { label: String, answer: String },
    #[error("This survey has no questions yet")]
    NoQuestions,
}

/// Check a submission against the questionnaire. Answers to unknown question
/// ids are dropped from the returned map.
pub fn validate_answers(
    questions: &[Question],
    answers: &HashMap<String, String>,
) -> Result<HashMap<String, String>, SurveyError> {
    if questions.is_empty() {
        return Err(SurveyError::NoQuestions);
    }

    let blank = |q: &Question| answers.get(&q.id).map_or(true, |a| a.trim().is_empty());
    if questions.iter().any(blank) {
        return Err(SurveyError::Incomplete);
    }

    let mut accepted = HashMap::with_capacity(questions.len());
    for q in questions {
        let answer = answers[&q.id].trim().to_string();
        match q.question_type {
            QuestionType::Rating => {
                let valid = answer
                    .parse::<u8>()
                    .is_ok_and(|n| (RATING_MIN..=RATING_MAX).contains(&n));
                if !valid {
                    return Err(SurveyError::InvalidRating { label: q.label.clone() });
                }
            }
            QuestionType::MultipleChoice => {
                if let Some(options) = &q.options {
                    if !options.iter().any(|o| o == &answer) {
                        return Err(SurveyError::InvalidChoice {
                            label: q.label.clone(),
                            answer,
                        });
                    }
                }
            }
            QuestionType::Text => {}
        }
        accepted.insert(q.id.clone(), answer);
    }
    Ok(accepted)
}
