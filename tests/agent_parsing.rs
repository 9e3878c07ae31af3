#[cfg(test)]
mod tests {
    use postsmith::agent::{compose_instruction, parse_json_block, Intent, Keywords, TurnRequest};
    use postsmith::db::{ContentKind, MessageRole};
    use uuid::Uuid;

    #[test]
    fn test_intent_label_parsing() {
        assert_eq!(Intent::parse("generate_post"), Intent::GeneratePost);
        assert_eq!(Intent::parse("  refine_post \n"), Intent::RefinePost);
        assert_eq!(Intent::parse("\"generate_image\""), Intent::GenerateImage);
        assert_eq!(Intent::parse("`generate_video`"), Intent::GenerateVideo);
        // Models sometimes wrap the label in prose
        assert_eq!(Intent::parse("The label is generate_meme."), Intent::GenerateMeme);
        assert_eq!(Intent::parse("GENERATE_POST"), Intent::GeneratePost);
        assert_eq!(Intent::parse("tell me a joke"), Intent::Unknown);
        assert_eq!(Intent::parse(""), Intent::Unknown);
    }

    #[test]
    fn test_keywords_parse_with_fences_and_partial_fields() {
        let raw = "```json\n{\"title\": \"AI Regulation\", \"context_change\": true}\n```";
        let keywords: Keywords = parse_json_block(raw).unwrap();
        assert_eq!(keywords.title, "AI Regulation");
        assert!(keywords.context_change);
        assert_eq!(keywords.content_type, "");
        assert_eq!(keywords.search_engine, "");
    }

    #[test]
    fn test_json_block_surrounded_by_prose() {
        let raw = "Sure! Here is the analysis:\n{\"title\": \"Rust 2.0\"}\nLet me know if you need more.";
        let keywords: Keywords = parse_json_block(raw).unwrap();
        assert_eq!(keywords.title, "Rust 2.0");
    }

    #[test]
    fn test_json_block_absent() {
        assert!(parse_json_block::<Keywords>("no structured data here").is_none());
        assert!(parse_json_block::<Keywords>("").is_none());
    }

    #[test]
    fn test_instruction_composition() {
        let turn = TurnRequest {
            session_id: Uuid::new_v4(),
            prompt: "Write about AI regulation".to_string(),
            platform: "linkedin".to_string(),
            content_kind: ContentKind::Image,
            tone: "formal".to_string(),
            user_id: None,
        };
        let instruction = compose_instruction(&turn, &turn.prompt);
        assert!(instruction.contains("Write about AI regulation"));
        assert!(instruction.contains("linkedin"));
        assert!(instruction.contains("formal"));
        assert!(instruction.contains("image"));
    }

    #[test]
    fn test_role_and_kind_labels() {
        assert_eq!(MessageRole::parse("assistant"), Some(MessageRole::Assistant));
        assert_eq!(MessageRole::parse("robot"), None);
        assert_eq!(ContentKind::from_db(Some("video")), ContentKind::Video);
        assert_eq!(ContentKind::from_db(None), ContentKind::None);
        assert_eq!(ContentKind::Image.as_db(), Some("image"));
        assert_eq!(ContentKind::None.as_db(), None);
    }
}
