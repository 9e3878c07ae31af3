#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    use postsmith::agent::{
        Intent, IntentClassifier, KeywordExtractor, Keywords, PostBundle, PostGenerator,
        PostSummary, TurnError, TurnOrchestrator, TurnRequest,
    };
    use postsmith::db::connection::init_schema;
    use postsmith::db::service::DbService;
    use postsmith::db::{ContentKind, DbPool, MessageRole};
    use postsmith::llm::models::{ChatMessage, ChatOptions, ChatResponse, ImageRequest};
    use postsmith::llm::{ImageGenerator, LlmError, LlmProvider, VideoGenerator};
    use postsmith::news::Article;

    // --- Scripted collaborators ---

    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(content) => Ok(ChatResponse {
                    content,
                    model: "scripted".to_string(),
                    usage: None,
                }),
                None => Err(LlmError::Api("script exhausted".to_string())),
            }
        }
    }

    struct FixedIntent(Intent);

    #[async_trait]
    impl IntentClassifier for FixedIntent {
        async fn classify(&self, _instruction: &str) -> Result<Intent, TurnError> {
            Ok(self.0)
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl IntentClassifier for FailingClassifier {
        async fn classify(&self, _instruction: &str) -> Result<Intent, TurnError> {
            Err(TurnError::Upstream("classifier is down".to_string()))
        }
    }

    struct FixedKeywords(Keywords);

    #[async_trait]
    impl KeywordExtractor for FixedKeywords {
        async fn extract(&self, _input: &str) -> Result<Keywords, TurnError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct ScriptedPosts {
        bundle: PostBundle,
        calls: Mutex<Vec<(Keywords, Vec<Article>, bool)>>,
    }

    #[async_trait]
    impl PostGenerator for ScriptedPosts {
        async fn generate(
            &self,
            keywords: &Keywords,
            prior_news: &[Article],
            refine: bool,
        ) -> Result<PostBundle, TurnError> {
            self.calls
                .lock()
                .unwrap()
                .push((keywords.clone(), prior_news.to_vec(), refine));
            Ok(self.bundle.clone())
        }
    }

    struct FailingPosts;

    #[async_trait]
    impl PostGenerator for FailingPosts {
        async fn generate(
            &self,
            _keywords: &Keywords,
            _prior_news: &[Article],
            _refine: bool,
        ) -> Result<PostBundle, TurnError> {
            Err(TurnError::Upstream("news crawl exploded".to_string()))
        }
    }

    struct FixedImage(String);

    #[async_trait]
    impl ImageGenerator for FixedImage {
        async fn generate(&self, _request: ImageRequest) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    struct FixedVideo(String);

    #[async_trait]
    impl VideoGenerator for FixedVideo {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    // --- Fixtures ---

    fn test_pool() -> DbPool {
        let conn = duckdb::Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            url: format!("https://news.example.com/{}", title),
            content: format!("Full text of {}", title),
        }
    }

    fn keywords(title: &str, context_change: bool) -> Keywords {
        Keywords {
            title: title.to_string(),
            context_change,
            content_type: "post".to_string(),
            source: "technology".to_string(),
            news: title.to_string(),
            search_engine: "duckduckgo".to_string(),
        }
    }

    fn bundle(post: Option<&str>, news: Vec<Article>) -> PostBundle {
        PostBundle {
            summary: post.map(|content| PostSummary {
                post_content: content.to_string(),
                image_prompt: Some("an image".to_string()),
                video_prompt: Some("a video".to_string()),
            }),
            news,
        }
    }

    fn turn(session_id: Uuid, prompt: &str) -> TurnRequest {
        TurnRequest {
            session_id,
            prompt: prompt.to_string(),
            platform: "linkedin".to_string(),
            content_kind: ContentKind::Text,
            tone: "professional".to_string(),
            user_id: None,
        }
    }

    fn orchestrator(
        pool: DbPool,
        llm: Arc<dyn LlmProvider>,
        classifier: Arc<dyn IntentClassifier>,
        extractor: Arc<dyn KeywordExtractor>,
        posts: Arc<dyn PostGenerator>,
    ) -> TurnOrchestrator {
        TurnOrchestrator::new(
            pool,
            llm,
            classifier,
            extractor,
            posts,
            Arc::new(FixedImage("https://img.example.com/out.png".to_string())),
            Arc::new(FixedVideo("https://video.example.com/out.mp4".to_string())),
            2,
        )
    }

    fn seed_session(pool: &DbPool, id: Uuid, name: &str, news: &[Article]) {
        let conn = pool.lock().unwrap();
        DbService::insert_session(&conn, id, name, None).unwrap();
        if !news.is_empty() {
            DbService::update_session_news(&conn, id, news).unwrap();
        }
    }

    // --- Tests ---

    #[tokio::test]
    async fn test_generate_post_creates_session_and_caches_news() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();
        let fetched = vec![article("a"), article("b"), article("c")];

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&["AI Regulation"]),
            Arc::new(FixedIntent(Intent::GeneratePost)),
            Arc::new(FixedKeywords(keywords("AI Regulation", true))),
            Arc::new(ScriptedPosts {
                bundle: bundle(Some("Regulators are moving fast..."), fetched.clone()),
                ..Default::default()
            }),
        );

        let view = orch
            .process_turn(turn(session_id, "Write a LinkedIn post about AI regulation"))
            .await
            .unwrap();

        assert_eq!(view.session.id, session_id);
        assert_eq!(view.session.name, "AI Regulation");
        assert_eq!(view.messages.len(), 2);

        assert_eq!(view.messages[0].role, MessageRole::User);
        assert_eq!(view.messages[0].kind, ContentKind::None);
        assert_eq!(view.messages[0].content, "Write a LinkedIn post about AI regulation");
        assert!(view.messages[0].metadata.is_none());

        assert_eq!(view.messages[1].role, MessageRole::Assistant);
        assert_eq!(view.messages[1].kind, ContentKind::Text);
        assert_eq!(view.messages[1].content, "Regulators are moving fast...");
        assert_eq!(view.messages[1].metadata.as_ref().unwrap()["title"], "AI Regulation");
        assert_eq!(view.messages[1].news.as_ref().unwrap().len(), 3);

        // Context cache persisted on the session itself
        assert_eq!(view.session.news, fetched);
    }

    #[tokio::test]
    async fn test_refine_post_passes_cached_news_and_refine_flag() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();
        let cached = vec![article("a"), article("b"), article("c")];
        seed_session(&pool, session_id, "AI Regulation", &cached);

        let posts = Arc::new(ScriptedPosts {
            bundle: bundle(Some("A shorter post."), vec![]),
            ..Default::default()
        });

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&[]),
            Arc::new(FixedIntent(Intent::RefinePost)),
            Arc::new(FixedKeywords(keywords("AI Regulation", false))),
            posts.clone(),
        );

        let view = orch.process_turn(turn(session_id, "make it shorter")).await.unwrap();

        let calls = posts.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (_, prior, refine) = &calls[0];
        assert_eq!(prior.len(), 3);
        assert!(*refine);

        // One user + one assistant appended; no second session; cache untouched
        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[1].content, "A shorter post.");
        assert_eq!(view.session.news, cached);

        let conn = pool.lock().unwrap();
        assert_eq!(DbService::list_sessions(&conn, 10, 0).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_user_prompt_persisted_when_classifier_fails() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();
        seed_session(&pool, session_id, "Existing", &[]);

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&[]),
            Arc::new(FailingClassifier),
            Arc::new(FixedKeywords(Keywords::default())),
            Arc::new(ScriptedPosts::default()),
        );

        let err = orch.process_turn(turn(session_id, "hello")).await.unwrap_err();
        assert!(matches!(err, TurnError::Upstream(_)));

        // The inbound message survived the failed turn
        let conn = pool.lock().unwrap();
        let messages = DbService::get_messages(&conn, session_id, 10, 0).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hello");
    }

    #[tokio::test]
    async fn test_declined_generation_yields_content_unavailable() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();
        seed_session(&pool, session_id, "Existing", &[]);

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&[]),
            Arc::new(FixedIntent(Intent::GeneratePost)),
            Arc::new(FixedKeywords(keywords("anything", true))),
            Arc::new(ScriptedPosts {
                bundle: bundle(None, vec![]),
                ..Default::default()
            }),
        );

        let err = orch.process_turn(turn(session_id, "write something")).await.unwrap_err();
        assert!(matches!(err, TurnError::ContentUnavailable));

        let conn = pool.lock().unwrap();
        let messages = DbService::get_messages(&conn, session_id, 10, 0).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_generator_error_swallowed_as_content_unavailable() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();
        seed_session(&pool, session_id, "Existing", &[]);

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&[]),
            Arc::new(FixedIntent(Intent::GeneratePost)),
            Arc::new(FixedKeywords(keywords("anything", true))),
            Arc::new(FailingPosts),
        );

        // A broken pipeline reads as "no content", not a server error
        let err = orch.process_turn(turn(session_id, "write something")).await.unwrap_err();
        assert!(matches!(err, TurnError::ContentUnavailable));
    }

    #[tokio::test]
    async fn test_empty_news_leaves_cache_untouched() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();
        let cached = vec![article("old-1"), article("old-2")];
        seed_session(&pool, session_id, "Existing", &cached);

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&[]),
            Arc::new(FixedIntent(Intent::GeneratePost)),
            Arc::new(FixedKeywords(keywords("same topic", false))),
            Arc::new(ScriptedPosts {
                bundle: bundle(Some("Another take."), vec![]),
                ..Default::default()
            }),
        );

        let view = orch.process_turn(turn(session_id, "another angle please")).await.unwrap();

        assert_eq!(view.session.news, cached);
        // The assistant message still snapshots the grounding that was used
        assert_eq!(view.messages[1].news.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_image_turn_appends_caption_then_image() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();
        seed_session(&pool, session_id, "Existing", &[]);

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&["A caption about launch day"]),
            Arc::new(FixedIntent(Intent::GenerateImage)),
            Arc::new(FixedKeywords(Keywords::default())),
            Arc::new(ScriptedPosts::default()),
        );

        let view = orch.process_turn(turn(session_id, "make a launch graphic")).await.unwrap();

        assert_eq!(view.messages.len(), 3);
        assert_eq!(view.messages[0].role, MessageRole::User);

        assert_eq!(view.messages[1].role, MessageRole::Assistant);
        assert_eq!(view.messages[1].kind, ContentKind::Text);
        assert_eq!(view.messages[1].content, "A caption about launch day");
        assert_eq!(view.messages[1].metadata.as_ref().unwrap()["user_prompt"], "make a launch graphic");

        assert_eq!(view.messages[2].role, MessageRole::Assistant);
        assert_eq!(view.messages[2].kind, ContentKind::Image);
        assert_eq!(view.messages[2].content, "https://img.example.com/out.png");
    }

    #[tokio::test]
    async fn test_video_turn_appends_caption_then_video() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();
        seed_session(&pool, session_id, "Existing", &[]);

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&["A caption for the teaser"]),
            Arc::new(FixedIntent(Intent::GenerateVideo)),
            Arc::new(FixedKeywords(Keywords::default())),
            Arc::new(ScriptedPosts::default()),
        );

        let view = orch.process_turn(turn(session_id, "teaser video please")).await.unwrap();

        assert_eq!(view.messages.len(), 3);
        assert_eq!(view.messages[1].kind, ContentKind::Text);
        assert_eq!(view.messages[2].kind, ContentKind::Video);
        assert_eq!(view.messages[2].content, "https://video.example.com/out.mp4");
    }

    #[tokio::test]
    async fn test_meme_turn_appends_single_image_without_caption() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();
        seed_session(&pool, session_id, "Existing", &[]);

        // Empty script: a meme turn must not ask the text model for anything
        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&[]),
            Arc::new(FixedIntent(Intent::GenerateMeme)),
            Arc::new(FixedKeywords(Keywords::default())),
            Arc::new(ScriptedPosts::default()),
        );

        let view = orch.process_turn(turn(session_id, "meme about mondays")).await.unwrap();

        assert_eq!(view.messages.len(), 2);
        assert_eq!(view.messages[0].role, MessageRole::User);
        assert_eq!(view.messages[1].role, MessageRole::Assistant);
        assert_eq!(view.messages[1].kind, ContentKind::Image);
        assert_eq!(view.messages[1].content, "https://img.example.com/out.png");
    }

    #[tokio::test]
    async fn test_unrecognized_intent_is_a_noop() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();
        seed_session(&pool, session_id, "Existing", &[]);

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&[]),
            Arc::new(FixedIntent(Intent::Unknown)),
            Arc::new(FixedKeywords(Keywords::default())),
            Arc::new(ScriptedPosts::default()),
        );

        let view = orch.process_turn(turn(session_id, "what's the weather")).await.unwrap();

        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_second_turn_reuses_session() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&["First Title"]),
            Arc::new(FixedIntent(Intent::Unknown)),
            Arc::new(FixedKeywords(Keywords::default())),
            Arc::new(ScriptedPosts::default()),
        );

        orch.process_turn(turn(session_id, "first prompt")).await.unwrap();
        let view = orch.process_turn(turn(session_id, "second prompt")).await.unwrap();

        // Title derived once, no second session created
        assert_eq!(view.session.name, "First Title");
        assert_eq!(view.messages.len(), 2);

        let conn = pool.lock().unwrap();
        assert_eq!(DbService::list_sessions(&conn, 10, 0).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_prompt_fails_validation_with_no_writes() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&[]),
            Arc::new(FixedIntent(Intent::GeneratePost)),
            Arc::new(FixedKeywords(Keywords::default())),
            Arc::new(ScriptedPosts::default()),
        );

        let err = orch.process_turn(turn(session_id, "   ")).await.unwrap_err();
        assert!(matches!(err, TurnError::Validation(_)));

        let conn = pool.lock().unwrap();
        assert!(DbService::get_session(&conn, session_id).unwrap().is_none());
        assert_eq!(DbService::list_sessions(&conn, 10, 0).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_assistant_metadata_carries_extracted_keywords() {
        let pool = test_pool();
        let session_id = Uuid::new_v4();
        seed_session(&pool, session_id, "Existing", &[]);

        let orch = orchestrator(
            pool.clone(),
            ScriptedLlm::new(&[]),
            Arc::new(FixedIntent(Intent::GeneratePost)),
            Arc::new(FixedKeywords(keywords("Quantum Chips", true))),
            Arc::new(ScriptedPosts {
                bundle: bundle(Some("Qubits ahoy."), vec![article("q")]),
                ..Default::default()
            }),
        );

        let view = orch.process_turn(turn(session_id, "post about quantum chips")).await.unwrap();

        let metadata = view.messages[1].metadata.as_ref().unwrap();
        assert_eq!(metadata["title"], "Quantum Chips");
        assert_eq!(metadata["context_change"], json!(true));
        assert_eq!(metadata["source"], "technology");
    }
}
