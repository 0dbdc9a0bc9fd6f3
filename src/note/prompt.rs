use crate::annotation::NoteType;

/// Shown on a note card when its completion request fails.
pub const ERROR_MESSAGE: &str = "Error generating note. Please try again.";

/// Marker for the trailing "thinking" line of the loading placeholder.
pub const THINKING_LINE: &str = "...";

pub const DEFAULT_LEARNER: &str = "AWS learner";

/// Build the completion prompt for a note, or `None` when no request should
/// be made (blank notes, empty highlights).
pub fn build_prompt(note_type: NoteType, highlighted: &str, learner: &str) -> Option<String> {
    let concept = highlighted.trim();
    if concept.is_empty() {
        return None;
    }
    let directive = match note_type {
        NoteType::Explain => format!(
            "Explain the following concept in 2-3 concise, educational bullet points for {}.",
            with_article(learner)
        ),
        NoteType::Example => format!(
            "Give 2-3 practical, real-world examples of the following concept for {}.",
            with_article(learner)
        ),
        NoteType::Simplify => format!(
            "Simplify the following concept in 2-3 easy-to-understand bullet points for a beginner {}.",
            learner
        ),
        NoteType::Blank => return None,
    };
    Some(format!("{directive}\n\nConcept: {concept}"))
}

fn with_article(noun: &str) -> String {
    let vowel = noun
        .chars()
        .next()
        .map(|c| "aeiouAEIOU".contains(c))
        .unwrap_or(false);
    if vowel {
        format!("an {noun}")
    } else {
        format!("a {noun}")
    }
}

/// Placeholder lines typed out while a note loads: two contextual lines and
/// the thinking indicator.
pub fn placeholder_lines(note_type: NoteType, highlighted: &str) -> Vec<String> {
    let mut lines = match note_type {
        NoteType::Example => vec![
            format!("AWS examples of \"{highlighted}\"."),
            "Examples for your skill level.".to_string(),
        ],
        NoteType::Simplify => vec![
            format!("Breaking down \"{highlighted}\"."),
            "Simpler terms for key concepts.".to_string(),
        ],
        NoteType::Explain | NoteType::Blank => vec![
            format!("How \"{highlighted}\" fits into AWS."),
            "Related IAM roles and permissions.".to_string(),
        ],
    };
    lines.push(THINKING_LINE.to_string());
    lines
}

pub fn loading_header(note_type: NoteType) -> &'static str {
    match note_type {
        NoteType::Example => "Finding examples...",
        NoteType::Simplify => "Simplifying...",
        NoteType::Explain | NoteType::Blank => "Deepening your knowledge...",
    }
}

pub fn banner_label(note_type: NoteType) -> &'static str {
    match note_type {
        NoteType::Explain => "Concept Explained",
        NoteType::Example => "Practical Example",
        NoteType::Simplify => "Concept Simplified",
        NoteType::Blank => "Blank Note",
    }
}

/// Strip a leading list marker (`-`, `*`, `•`, `1.`) from a trimmed line.
/// A marker only counts when whitespace or the end of line follows it.
fn strip_marker(line: &str) -> Option<&str> {
    let line = line.trim_start();
    fn after_marker(rest: &str) -> Option<&str> {
        match rest.chars().next() {
            None => Some(""),
            Some(c) if c.is_whitespace() => Some(rest.trim_start()),
            Some(_) => None,
        }
    }
    for marker in ["-", "*", "•"] {
        if let Some(rest) = line.strip_prefix(marker) {
            return after_marker(rest);
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix('.') {
            return after_marker(rest);
        }
    }
    None
}

fn is_list_item(line: &str) -> bool {
    strip_marker(line).is_some()
}

/// Split a completion into bullets, one per non-empty line with list
/// markers removed. A single-line reply stays one bullet.
pub fn parse_bullets(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let lines: Vec<String> = text
        .lines()
        .map(|l| strip_marker(l).unwrap_or(l).trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() > 1 {
        lines
    } else {
        vec![text.trim().to_string()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Paragraph(String),
    List(Vec<String>),
}

/// Group note content into paragraphs and bullet lists. Blocks are separated
/// by blank lines; a block is a list when every line carries a marker.
pub fn content_blocks(content: &str) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(finish_block(&current));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(finish_block(&current));
    }
    blocks
}

fn finish_block(lines: &[&str]) -> ContentBlock {
    if lines.len() > 1 && lines.iter().all(|l| is_list_item(l)) {
        ContentBlock::List(lines.iter().filter_map(|l| strip_marker(l)).map(str::to_string).collect())
    } else {
        ContentBlock::Paragraph(lines.join("\n"))
    }
}

/// The blocks of `content` revealed so far. `shown` holds one entry per
/// non-empty content line, in order, as [`parse_bullets`] splits them;
/// lines past its end are left out.
pub fn revealed_blocks(content: &str, shown: &[&str]) -> Vec<ContentBlock> {
    let mut shown = shown.iter().copied();
    let mut blocks = Vec::new();
    for block in content_blocks(content) {
        let lines: Vec<&str> = match &block {
            ContentBlock::Paragraph(p) => p.lines().filter(|l| !strip_marker(l).unwrap_or(*l).trim().is_empty()).collect(),
            ContentBlock::List(items) => items.iter().map(String::as_str).filter(|i| !i.trim().is_empty()).collect(),
        };
        let revealed: Vec<String> = lines.iter().map_while(|_| shown.next()).map(str::to_string).collect();
        if revealed.is_empty() {
            break;
        }
        let complete = revealed.len() == lines.len();
        blocks.push(match block {
            ContentBlock::Paragraph(_) => ContentBlock::Paragraph(revealed.join("\n")),
            ContentBlock::List(_) => ContentBlock::List(revealed),
        });
        if !complete {
            break;
        }
    }
    blocks
}

const AWS_SERVICES: &[&str] = &[
    "Lex", "Polly", "EC2", "IAM", "S3", "Lambda", "CloudFormation", "DynamoDB", "SNS", "SQS", "VPC",
    "CloudWatch", "ECS", "EKS", "RDS", "SageMaker", "Glue", "Athena", "Redshift", "Kinesis",
    "Step Functions",
];

/// Services named in `text`, matched as whole words, case-insensitively.
pub fn detect_services(text: &str) -> Vec<&'static str> {
    let haystack = text.to_lowercase();
    AWS_SERVICES
        .iter()
        .copied()
        .filter(|service| contains_word(&haystack, &service.to_lowercase()))
        .collect()
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let is_word_char = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(word).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + word.len()..].chars().next();
        !before.map(is_word_char).unwrap_or(false) && !after.map(is_word_char).unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_prompt_explain() {
        let prompt = build_prompt(NoteType::Explain, "Lex", DEFAULT_LEARNER).unwrap();
        assert_eq!(
            prompt,
            "Explain the following concept in 2-3 concise, educational bullet points for an AWS learner.\n\nConcept: Lex"
        );
    }

    #[test]
    fn test_build_prompt_example_and_simplify() {
        assert_eq!(
            build_prompt(NoteType::Example, "Lex", DEFAULT_LEARNER).unwrap(),
            "Give 2-3 practical, real-world examples of the following concept for an AWS learner.\n\nConcept: Lex"
        );
        assert_eq!(
            build_prompt(NoteType::Simplify, "Lex", DEFAULT_LEARNER).unwrap(),
            "Simplify the following concept in 2-3 easy-to-understand bullet points for a beginner AWS learner.\n\nConcept: Lex"
        );
    }

    #[test]
    fn test_build_prompt_custom_learner() {
        let prompt = build_prompt(NoteType::Explain, "Pods", "Kubernetes student").unwrap();
        assert!(prompt.contains("for a Kubernetes student."));
    }

    #[test]
    fn test_no_prompt_for_blank_or_empty() {
        assert_eq!(build_prompt(NoteType::Blank, "Lex", DEFAULT_LEARNER), None);
        assert_eq!(build_prompt(NoteType::Explain, "   ", DEFAULT_LEARNER), None);
    }

    #[test]
    fn test_placeholder_lines() {
        let lines = placeholder_lines(NoteType::Simplify, "Lex");
        assert_eq!(
            lines,
            vec![
                "Breaking down \"Lex\".".to_string(),
                "Simpler terms for key concepts.".to_string(),
                THINKING_LINE.to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_bullets_markers() {
        let reply = "- Lex builds chat interfaces.\n- It uses the same engine as Alexa.\n\n• Integrates with Lambda.";
        assert_eq!(
            parse_bullets(reply),
            vec![
                "Lex builds chat interfaces.".to_string(),
                "It uses the same engine as Alexa.".to_string(),
                "Integrates with Lambda.".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_bullets_numbered() {
        let reply = "1. First point\n2. Second point";
        assert_eq!(parse_bullets(reply), vec!["First point".to_string(), "Second point".to_string()]);
    }

    #[test]
    fn test_markers_need_trailing_space() {
        let reply = "**Bold** claim\n3.5 million requests\n-5 degrees\n*\tStarred";
        assert_eq!(
            parse_bullets(reply),
            vec![
                "**Bold** claim".to_string(),
                "3.5 million requests".to_string(),
                "-5 degrees".to_string(),
                "Starred".to_string(),
            ]
        );
    }

    #[test]
    fn test_emphasised_lines_are_not_a_list() {
        let content = "**Intents** map requests.\n**Slots** hold values.";
        assert_eq!(content_blocks(content), vec![ContentBlock::Paragraph(content.to_string())]);
    }

    #[test]
    fn test_parse_bullets_single_paragraph() {
        let reply = "  Lex is a service for building real-world chatbots.  ";
        assert_eq!(
            parse_bullets(reply),
            vec!["Lex is a service for building real-world chatbots.".to_string()]
        );
        assert!(parse_bullets("").is_empty());
    }

    #[test]
    fn test_content_blocks() {
        let content = "Amazon Lex in short:\n\n- Speech recognition\n- Language understanding\n\nIt pairs well with Lambda.";
        assert_eq!(
            content_blocks(content),
            vec![
                ContentBlock::Paragraph("Amazon Lex in short:".to_string()),
                ContentBlock::List(vec![
                    "Speech recognition".to_string(),
                    "Language understanding".to_string(),
                ]),
                ContentBlock::Paragraph("It pairs well with Lambda.".to_string()),
            ]
        );
    }

    #[test]
    fn test_single_marked_line_is_paragraph() {
        assert_eq!(
            content_blocks("- only one"),
            vec![ContentBlock::Paragraph("- only one".to_string())]
        );
    }

    #[test]
    fn test_revealed_blocks_follow_content_shape() {
        let content = "Amazon Lex in short:\n\n- Speech recognition\n- Language understanding";
        let bullets = parse_bullets(content);
        let all: Vec<&str> = bullets.iter().map(String::as_str).collect();
        assert_eq!(revealed_blocks(content, &all), content_blocks(content));

        assert_eq!(
            revealed_blocks(content, &["Amazon Lex in short:", "Spee"]),
            vec![
                ContentBlock::Paragraph("Amazon Lex in short:".to_string()),
                ContentBlock::List(vec!["Spee".to_string()]),
            ]
        );
        assert!(revealed_blocks(content, &[]).is_empty());
    }

    #[test]
    fn test_revealed_single_line_stays_paragraph() {
        let reply = "Lex turns speech into intents.";
        assert_eq!(
            revealed_blocks(reply, &["Lex turns"]),
            vec![ContentBlock::Paragraph("Lex turns".to_string())]
        );
    }

    #[test]
    fn test_detect_services() {
        assert_eq!(detect_services("Amazon Lex calls a lambda function"), vec!["Lex", "Lambda"]);
        assert!(detect_services("Lexicon and S3x").is_empty());
        assert_eq!(detect_services("Use Step Functions."), vec!["Step Functions"]);
    }

    #[test]
    fn test_labels() {
        assert_eq!(loading_header(NoteType::Example), "Finding examples...");
        assert_eq!(banner_label(NoteType::Blank), "Blank Note");
    }
}
