use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::{
    IntentClassifier, Intent, KeywordExtractor, LlmIntentClassifier, LlmKeywordExtractor,
    LlmPostGenerator, PostBundle, PostGenerator, TurnError,
};
use crate::config::AppConfig;
use crate::db::{
    service::DbService, ContentKind, DbPool, Message, MessageRole, Session,
};
use crate::llm::{
    image::OpenAiImageClient,
    models::{ChatMessage, ChatOptions, ImageRequest, ImageStyle},
    video::VideoClient,
    ImageGenerator, LlmProvider, ProviderFactory, VideoGenerator,
};
use crate::news::SearchClient;

/// Everything the full-history read-back will return at most. Matches the
/// transcript export bound.
const HISTORY_LIMIT: usize = 1000;

/// One inbound turn: prompt plus delivery metadata. Ephemeral, discarded
/// once the response is assembled.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    pub session_id: Uuid,
    pub prompt: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub content_kind: ContentKind,
    #[serde(default)]
    pub tone: String,
    pub user_id: Option<Uuid>,
}

/// The turn result: the persisted session exactly as stored, with its full
/// ordered history.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    pub messages: Vec<Message>,
}

/// Owns a single turn end to end: resolve the session, record the prompt,
/// classify intent, run exactly one generation branch, read the session
/// back. No step runs in parallel with another; each depends on the last.
pub struct TurnOrchestrator {
    pool: DbPool,
    llm: Arc<dyn LlmProvider>,
    classifier: Arc<dyn IntentClassifier>,
    extractor: Arc<dyn KeywordExtractor>,
    posts: Arc<dyn PostGenerator>,
    images: Arc<dyn ImageGenerator>,
    videos: Arc<dyn VideoGenerator>,
    history_window: usize,
}

impl TurnOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: DbPool,
        llm: Arc<dyn LlmProvider>,
        classifier: Arc<dyn IntentClassifier>,
        extractor: Arc<dyn KeywordExtractor>,
        posts: Arc<dyn PostGenerator>,
        images: Arc<dyn ImageGenerator>,
        videos: Arc<dyn VideoGenerator>,
        history_window: usize,
    ) -> Self {
        Self {
            pool,
            llm,
            classifier,
            extractor,
            posts,
            images,
            videos,
            history_window,
        }
    }

    /// Wires the real collaborators from config. `None` when the configured
    /// text provider is missing its block.
    pub fn from_config(config: &AppConfig, pool: DbPool) -> Option<Self> {
        let llm = ProviderFactory::create_default(config)?;
        let retriever = Arc::new(SearchClient::new(config.search.max_results));

        Some(Self::new(
            pool,
            llm.clone(),
            Arc::new(LlmIntentClassifier::new(llm.clone())),
            Arc::new(LlmKeywordExtractor::new(llm.clone())),
            Arc::new(LlmPostGenerator::new(llm, retriever)),
            Arc::new(OpenAiImageClient::new(&config.media.image)),
            Arc::new(VideoClient::new(&config.media.video)),
            config.chat.history_window,
        ))
    }

    pub async fn process_turn(&self, turn: TurnRequest) -> Result<SessionView, TurnError> {
        let prompt = turn.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(TurnError::Validation("prompt must not be empty".into()));
        }

        let (session, recent) = self.resolve_session(&turn, &prompt).await?;

        // The user's utterance is durably recorded before anything that can
        // fail downstream.
        {
            let conn = self.pool.lock().unwrap();
            DbService::insert_message(
                &conn,
                session.id,
                MessageRole::User,
                ContentKind::None,
                &prompt,
                None,
                None,
            )?;
        }

        let instruction = compose_instruction(&turn, &prompt);
        let intent = self.classifier.classify(&instruction).await?;
        info!("Session {} resolved intent: {}", session.id, intent);

        match intent {
            Intent::GeneratePost => {
                self.run_post_branch(&session, &recent, &instruction, false)
                    .await?
            }
            Intent::RefinePost => {
                self.run_post_branch(&session, &recent, &instruction, true)
                    .await?
            }
            Intent::GenerateImage => {
                self.run_media_branch(&turn, &prompt, &instruction, ContentKind::Image)
                    .await?
            }
            Intent::GenerateVideo => {
                self.run_media_branch(&turn, &prompt, &instruction, ContentKind::Video)
                    .await?
            }
            Intent::GenerateMeme => {
                let url = self
                    .images
                    .generate(ImageRequest {
                        prompt: instruction.clone(),
                        style: Some(ImageStyle::Meme),
                    })
                    .await?;

                let conn = self.pool.lock().unwrap();
                DbService::insert_message(
                    &conn,
                    session.id,
                    MessageRole::Assistant,
                    ContentKind::Image,
                    &url,
                    Some(json!({ "user_prompt": prompt })),
                    None,
                )?;
            }
            Intent::Unknown => {
                // Valid no-op terminal state; the caller still gets the
                // refreshed session below.
                info!("Session {} turn had no recognizable intent", session.id);
            }
        }

        self.session_view(session.id)
    }

    /// Guarantees the session exists after the call. Creation derives the
    /// display name from a title completion over the first prompt; this is
    /// the only place a session is ever created.
    async fn resolve_session(
        &self,
        turn: &TurnRequest,
        prompt: &str,
    ) -> Result<(Session, Vec<Message>), TurnError> {
        let existing = {
            let conn = self.pool.lock().unwrap();
            DbService::get_session(&conn, turn.session_id)?
        };

        match existing {
            Some(session) => {
                let recent = {
                    let conn = self.pool.lock().unwrap();
                    DbService::recent_messages(&conn, session.id, self.history_window, None)?
                };
                Ok((session, recent))
            }
            None => {
                let title = self
                    .llm
                    .chat(
                        &[
                            ChatMessage::system("Create a short title from the user prompt. Reply with the title only."),
                            ChatMessage::user(prompt),
                        ],
                        ChatOptions {
                            max_tokens: Some(32),
                            ..Default::default()
                        },
                    )
                    .await?;
                let title = title.content.trim().trim_matches('"').to_string();

                let conn = self.pool.lock().unwrap();
                let session =
                    DbService::insert_session(&conn, turn.session_id, &title, turn.user_id)?;
                info!("Created session {} ({})", session.id, session.name);
                Ok((session, Vec::new()))
            }
        }
    }

    /// `generate_post` / `refine_post`: keywords, then the post pipeline.
    /// A pipeline error is not a turn error here; it reads as "no post
    /// produced" and takes the ContentUnavailable exit.
    async fn run_post_branch(
        &self,
        session: &Session,
        recent: &[Message],
        instruction: &str,
        refine: bool,
    ) -> Result<(), TurnError> {
        let extractor_input = with_recent_context(instruction, recent);
        let keywords = self.extractor.extract(&extractor_input).await?;

        let bundle = match self.posts.generate(&keywords, &session.news, refine).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Post generation failed, treating as no content: {}", e);
                PostBundle::default()
            }
        };

        // Fresh news is cached before the message append so a later refine
        // can pick it up even if this turn dies right after this point.
        if !bundle.news.is_empty() {
            let conn = self.pool.lock().unwrap();
            DbService::update_session_news(&conn, session.id, &bundle.news)?;
        }

        let post = bundle
            .summary
            .filter(|s| !s.post_content.trim().is_empty())
            .ok_or(TurnError::ContentUnavailable)?;

        let news_snapshot = if bundle.news.is_empty() {
            session.news.clone()
        } else {
            bundle.news
        };

        let conn = self.pool.lock().unwrap();
        DbService::insert_message(
            &conn,
            session.id,
            MessageRole::Assistant,
            ContentKind::Text,
            &post.post_content,
            Some(serde_json::to_value(&keywords).unwrap_or_default()),
            Some(&news_snapshot),
        )?;

        Ok(())
    }

    /// `generate_image` / `generate_video`: a supporting caption first, then
    /// the media asset. Two assistant messages, text before media.
    async fn run_media_branch(
        &self,
        turn: &TurnRequest,
        prompt: &str,
        instruction: &str,
        kind: ContentKind,
    ) -> Result<(), TurnError> {
        let caption = self
            .llm
            .chat(
                &[
                    ChatMessage::system(
                        "Create post content based on the provided platform, tone and prompt.",
                    ),
                    ChatMessage::user(
                        json!({
                            "prompt": prompt,
                            "platform": turn.platform,
                            "tone": turn.tone,
                        })
                        .to_string(),
                    ),
                ],
                ChatOptions::default(),
            )
            .await?;

        {
            let conn = self.pool.lock().unwrap();
            DbService::insert_message(
                &conn,
                turn.session_id,
                MessageRole::Assistant,
                ContentKind::Text,
                caption.content.trim(),
                Some(json!({ "user_prompt": prompt })),
                None,
            )?;
        }

        let url = match kind {
            ContentKind::Video => self.videos.generate(instruction).await?,
            _ => {
                self.images
                    .generate(ImageRequest {
                        prompt: instruction.to_string(),
                        style: None,
                    })
                    .await?
            }
        };

        let conn = self.pool.lock().unwrap();
        DbService::insert_message(
            &conn,
            turn.session_id,
            MessageRole::Assistant,
            kind,
            &url,
            Some(json!({ "user_prompt": prompt })),
            None,
        )?;

        Ok(())
    }

    /// Reads the persisted state back verbatim so the caller sees exactly
    /// what was durably stored, whatever happened in between.
    fn session_view(&self, session_id: Uuid) -> Result<SessionView, TurnError> {
        let conn = self.pool.lock().unwrap();
        let session = DbService::get_session(&conn, session_id)?
            .ok_or_else(|| TurnError::Upstream("session vanished during turn".into()))?;
        let messages = DbService::get_messages(&conn, session_id, HISTORY_LIMIT, 0)?;

        Ok(SessionView { session, messages })
    }
}

/// The single denormalized instruction blob the classifier and extractor
/// work from.
pub fn compose_instruction(turn: &TurnRequest, prompt: &str) -> String {
    format!(
        "content kind: {} | prompt: {} | platform: {} | tone: {}",
        turn.content_kind, prompt, turn.platform, turn.tone
    )
}

/// Folds the most recent user prompt into the extractor input so follow-up
/// phrasings like "make it shorter" still carry their topic.
fn with_recent_context(instruction: &str, recent: &[Message]) -> String {
    let previous = recent
        .iter()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
        .unwrap_or("");

    if previous.is_empty() {
        instruction.to_string()
    } else {
        format!("{}\nprevious prompt: {}", instruction, previous)
    }
}
