use std::fmt;

/// Answer framing requested by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StudyMode {
    #[default]
    Default,
    Socratic,
    StudyPlan,
}

impl StudyMode {
    /// Total parse: anything unrecognised falls back to [`StudyMode::Default`].
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "socratic" => Self::Socratic,
            "studyplan" => Self::StudyPlan,
            _ => Self::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Socratic => "socratic",
            Self::StudyPlan => "studyplan",
        }
    }

    fn response_shape(self) -> &'static str {
        match self {
            Self::Default => "Give a concise answer followed by 2-3 key takeaways.",
            Self::Socratic => "Begin with 1-2 guiding questions that lead the student toward the answer, then add a brief sourced note.",
            Self::StudyPlan => "Lay out a study plan of 3-5 steps (read, reflect, practice), citing the readings for each step.",
        }
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// System instruction for the study assistant.
///
/// `with_readings` switches between grounding in the retrieved course readings
/// and answering from general knowledge.
pub fn build_system_prompt(course: &str, mode: StudyMode, with_readings: bool) -> String {
    let grounding = if with_readings {
        "Answer ONLY from the retrieved course readings. Include citations (chapter/page) whenever possible. If the evidence is insufficient, say so and suggest where in the readings to look."
    } else {
        "No course readings are attached yet, so answer from general knowledge and say that your answer is not drawn from the course readings."
    };

    format!(
        r#"You are the MIQ Study Assistant for the course "{course}".
Be concise, clear and helpful.
{grounding}
Response shape ({mode} mode): {shape}"#,
        shape = mode.response_shape(),
    )
}

pub fn build_user_message(course: &str, mode: StudyMode, question: &str) -> String {
    format!("Course: {course}\nMode: {mode}\nQuestion: {question}")
}
