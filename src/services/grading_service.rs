use crate::models::question::Question;
use crate::models::user_response::UserResponse;

pub const DEFAULT_FEEDBACK: &str = "Evaluated";

/// Score and feedback extracted from a grader reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedGrade {
    pub score: i32,
    pub feedback: String,
}

pub struct GradingService;

impl GradingService {
    /// Builds the single user message sent to the grading model.
    pub fn build_prompt(response: &UserResponse, question: &Question) -> String {
        format!(
            r#"You are a QA Lead. Compare the Tester's answer to the Ground Truth.

--- GROUND TRUTH (IDEAL) ---
Status: {ideal_status}
Explanation: {ideal_explanation}
Critical Error: {ideal_error}

--- TESTER ANSWER ---
Status: {status}
Explanation: {explanation}
Critical Error: {critical_error}

--- RULES ---
1. If the 'Status' does not match the Ground Truth, score is 0.
2. If Status matches, evaluate the Explanation quality (1-100).
3. Check if they caught the Critical Error (if one existed).

Return strictly in this format:
SCORE: [number]
FEEDBACK: [text]
"#,
            ideal_status = question.ideal_status.as_deref().unwrap_or_default(),
            ideal_explanation = question.ideal_explanation.as_deref().unwrap_or_default(),
            ideal_error = question.ideal_error.as_deref().unwrap_or_default(),
            status = response.status,
            explanation = response.explanation,
            critical_error = response.critical_error,
        )
    }

    /// Line-oriented parse of a `SCORE:` / `FEEDBACK:` reply.
    ///
    /// Markers are matched case-insensitively. Feedback is everything after the
    /// first colon; the score is the segment between the first and second
    /// colon. A later matching line overrides an earlier one; a score that does
    /// not parse as an integer leaves the previous value in place.
    pub fn parse_reply(text: &str) -> ParsedGrade {
        let mut score = 0;
        let mut feedback: Option<String> = None;

        for line in text.lines() {
            let upper = line.to_uppercase();
            let Some((_, value)) = line.split_once(':') else {
                continue;
            };

            if upper.contains("SCORE:") {
                if let Some(parsed) = parse_score(value) {
                    score = parsed;
                }
            }
            if upper.contains("FEEDBACK:") {
                feedback = Some(value.trim().to_string());
            }
        }

        ParsedGrade {
            score,
            feedback: feedback.unwrap_or_else(|| DEFAULT_FEEDBACK.to_string()),
        }
    }
}

fn parse_score(raw: &str) -> Option<i32> {
    raw.split(':')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c: char| c == '*' || c == '[' || c == ']' || c.is_whitespace())
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::GENERAL_INSTRUCTION;
    use chrono::Utc;

    fn pair() -> (UserResponse, Question) {
        let response = UserResponse {
            id: 1,
            session_id: 1,
            question_id: 9,
            status: "Failure".into(),
            explanation: "Button does nothing".into(),
            critical_error: "Checkout unreachable".into(),
            ai_score: None,
            ai_feedback: None,
            created_at: Utc::now(),
        };
        let question = Question {
            id: 9,
            test_id: 1,
            task_id: Some("T-9".into()),
            link: "https://example.com/t/9".into(),
            description: GENERAL_INSTRUCTION.into(),
            ideal_status: Some("Failure".into()),
            ideal_explanation: Some("Submit handler missing".into()),
            ideal_error: Some("Orders cannot be placed".into()),
        };
        (response, question)
    }

    #[test]
    fn prompt_carries_both_answers_and_the_output_contract() {
        let (response, question) = pair();
        let prompt = GradingService::build_prompt(&response, &question);

        assert!(prompt.contains("Explanation: Submit handler missing"));
        assert!(prompt.contains("Critical Error: Orders cannot be placed"));
        assert!(prompt.contains("Explanation: Button does nothing"));
        assert!(prompt.contains("Critical Error: Checkout unreachable"));
        assert!(prompt.contains("score is 0"));
        assert!(prompt.contains("SCORE: [number]"));
        assert!(prompt.contains("FEEDBACK: [text]"));
    }

    #[test]
    fn parses_plain_reply() {
        let parsed = GradingService::parse_reply("SCORE: 85\nFEEDBACK: Good catch on the error.");
        assert_eq!(parsed.score, 85);
        assert_eq!(parsed.feedback, "Good catch on the error.");
    }

    #[test]
    fn tolerates_case_and_markdown_noise() {
        let parsed = GradingService::parse_reply(
            "Here is my verdict.\n**Score:** [72]\nfeedback: Explanation is thin: misses root cause",
        );
        assert_eq!(parsed.score, 72);
        assert_eq!(parsed.feedback, "Explanation is thin: misses root cause");
    }

    #[test]
    fn unparsable_score_defaults_to_zero() {
        let parsed = GradingService::parse_reply("SCORE: excellent\nFEEDBACK: ok");
        assert_eq!(parsed.score, 0);
        assert_eq!(parsed.feedback, "ok");
    }

    #[test]
    fn score_stops_at_the_next_colon() {
        let parsed = GradingService::parse_reply("SCORE: 85: solid\nFEEDBACK: ok");
        assert_eq!(parsed.score, 85);
        assert_eq!(parsed.feedback, "ok");

        assert_eq!(GradingService::parse_reply("**SCORE:** [64]: partial").score, 64);
    }

    #[test]
    fn missing_feedback_uses_default() {
        let parsed = GradingService::parse_reply("SCORE: 40");
        assert_eq!(parsed.score, 40);
        assert_eq!(parsed.feedback, DEFAULT_FEEDBACK);

        let empty = GradingService::parse_reply("");
        assert_eq!(empty, ParsedGrade { score: 0, feedback: DEFAULT_FEEDBACK.into() });
    }

    #[test]
    fn later_lines_override_earlier_ones() {
        let parsed =
            GradingService::parse_reply("SCORE: 10\nFEEDBACK: first\nSCORE: 90\nFEEDBACK: second");
        assert_eq!(parsed.score, 90);
        assert_eq!(parsed.feedback, "second");
    }

    #[test]
    fn scores_are_not_clamped() {
        assert_eq!(GradingService::parse_reply("SCORE: 150").score, 150);
        assert_eq!(GradingService::parse_reply("SCORE: -5").score, -5);
    }
}
