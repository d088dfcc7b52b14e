use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::{InterviewStore, StoreStats};
use crate::models::chat::{ChatContextRow, ContextUpsert, NewChatContext};
use crate::models::interview::{
    NewQuestion, NewResponse, NewSession, QuestionRow, ResponseRow, SessionRow, SessionStatus,
};
use crate::models::posting::{JobPostingRow, NewJobPosting};

/// Postgres-backed store. Multi-row writes run in one transaction and end by
/// recomputing the owning session's counters.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UpsertedContext {
    #[sqlx(flatten)]
    context: ChatContextRow,
    inserted: bool,
}

/// Recomputes session counters from child rows inside `tx`.
async fn recount(tx: &mut Transaction<'_, Postgres>, session_id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE interview_sessions s SET
            total_questions   = (SELECT COUNT(*) FROM interview_questions q WHERE q.session_id = s.id),
            total_responses   = (SELECT COUNT(*) FROM interview_responses r WHERE r.session_id = s.id),
            avg_response_time = COALESCE(
                (SELECT AVG(r.response_time_seconds) FROM interview_responses r WHERE r.session_id = s.id),
                0),
            updated_at = NOW()
        WHERE s.id = $1
        "#,
    )
    .bind(session_id)
    .execute(&mut **tx)
    .await
    .context("recounting session totals")?;
    Ok(())
}

#[async_trait]
impl InterviewStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn upsert_chat_context(&self, new: NewChatContext) -> Result<ContextUpsert> {
        // NULL urls never conflict, so url-less contexts always insert.
        // An inactive row matches the conflict but fails the WHERE and
        // returns nothing.
        let upserted = sqlx::query_as::<_, UpsertedContext>(
            r#"
            INSERT INTO chat_contexts
                (id, url, chat_title, project_title, client_name, participants,
                 messages, total_messages, extracted_topics)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (url) DO UPDATE SET
                messages = EXCLUDED.messages,
                total_messages = EXCLUDED.total_messages,
                extracted_topics = EXCLUDED.extracted_topics,
                extracted_at = NOW(),
                updated_at = NOW()
            WHERE chat_contexts.is_active
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.url)
        .bind(&new.chat_title)
        .bind(&new.project_title)
        .bind(&new.client_name)
        .bind(&new.participants)
        .bind(Json(&new.messages))
        .bind(new.messages.len() as i32)
        .bind(&new.extracted_topics)
        .fetch_optional(&self.pool)
        .await
        .context("upserting chat context")?;

        match upserted {
            Some(UpsertedContext { context: row, inserted: true }) => {
                info!("Inserted chat context {}", row.id);
                Ok(ContextUpsert::Created(row))
            }
            Some(UpsertedContext { context: row, .. }) => Ok(ContextUpsert::Updated(row)),
            None => {
                let frozen = sqlx::query_as::<_, ChatContextRow>(
                    "SELECT * FROM chat_contexts WHERE url = $1",
                )
                .bind(&new.url)
                .fetch_one(&self.pool)
                .await
                .context("loading inactive chat context")?;
                Ok(ContextUpsert::Frozen(frozen))
            }
        }
    }

    async fn get_chat_context(&self, id: Uuid) -> Result<Option<ChatContextRow>> {
        Ok(
            sqlx::query_as::<_, ChatContextRow>("SELECT * FROM chat_contexts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn deactivate_chat_context(&self, id: Uuid) -> Result<Option<ChatContextRow>> {
        Ok(sqlx::query_as::<_, ChatContextRow>(
            r#"
            UPDATE chat_contexts SET
                updated_at = CASE WHEN is_active THEN NOW() ELSE updated_at END,
                is_active = FALSE
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_session(&self, new: NewSession) -> Result<SessionRow> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO interview_sessions
                (id, context_id, session_name, candidate_name, interview_type, difficulty, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.context_id)
        .bind(&new.session_name)
        .bind(&new.candidate_name)
        .bind(&new.interview_type)
        .bind(&new.difficulty)
        .bind(SessionStatus::Active.as_str())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<SessionRow>> {
        Ok(
            sqlx::query_as::<_, SessionRow>("SELECT * FROM interview_sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_sessions(&self, limit: i64) -> Result<Vec<SessionRow>> {
        Ok(sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM interview_sessions ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_session_status(
        &self,
        id: Uuid,
        status: SessionStatus,
    ) -> Result<Option<SessionRow>> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE interview_sessions SET
                status = $2,
                completed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn mark_session_started(&self, id: Uuid) -> Result<Option<SessionRow>> {
        Ok(sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE interview_sessions SET
                status = 'active',
                started_at = COALESCE(started_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn add_questions(
        &self,
        session_id: Uuid,
        questions: Vec<NewQuestion>,
    ) -> Result<Vec<QuestionRow>> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent appends to the same session.
        sqlx::query("SELECT id FROM interview_sessions WHERE id = $1 FOR UPDATE")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?
            .with_context(|| format!("session {session_id} not found"))?;

        let next: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM interview_questions WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut rows = Vec::with_capacity(questions.len());
        for (i, q) in questions.into_iter().enumerate() {
            let row = sqlx::query_as::<_, QuestionRow>(
                r#"
                INSERT INTO interview_questions
                    (id, session_id, position, question_text, question_type, difficulty,
                     related_topics, generated_by_model, generation_confidence)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(next + i as i32)
            .bind(&q.question_text)
            .bind(&q.question_type)
            .bind(&q.difficulty)
            .bind(&q.related_topics)
            .bind(&q.generated_by_model)
            .bind(q.generation_confidence)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }

        recount(&mut tx, session_id).await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn list_questions(&self, session_id: Uuid) -> Result<Vec<QuestionRow>> {
        Ok(sqlx::query_as::<_, QuestionRow>(
            "SELECT * FROM interview_questions WHERE session_id = $1 ORDER BY position",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<QuestionRow>> {
        Ok(
            sqlx::query_as::<_, QuestionRow>("SELECT * FROM interview_questions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn mark_question_asked(&self, id: Uuid) -> Result<Option<QuestionRow>> {
        Ok(sqlx::query_as::<_, QuestionRow>(
            "UPDATE interview_questions SET asked_at = COALESCE(asked_at, NOW()) WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_response(&self, new: NewResponse) -> Result<ResponseRow> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ResponseRow>(
            r#"
            INSERT INTO interview_responses
                (id, question_id, session_id, response_text, response_time_seconds,
                 sentiment_score, relevance_score, technical_accuracy, analysis,
                 needs_follow_up, follow_up_text, follow_up_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (question_id) DO UPDATE SET
                response_text         = EXCLUDED.response_text,
                response_time_seconds = EXCLUDED.response_time_seconds,
                sentiment_score       = EXCLUDED.sentiment_score,
                relevance_score       = EXCLUDED.relevance_score,
                technical_accuracy    = EXCLUDED.technical_accuracy,
                analysis              = EXCLUDED.analysis,
                needs_follow_up       = EXCLUDED.needs_follow_up,
                follow_up_text        = EXCLUDED.follow_up_text,
                follow_up_type        = EXCLUDED.follow_up_type,
                analyzed_at           = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.question_id)
        .bind(new.session_id)
        .bind(&new.response_text)
        .bind(new.response_time_seconds)
        .bind(new.sentiment_score)
        .bind(new.relevance_score)
        .bind(new.technical_accuracy)
        .bind(&new.analysis)
        .bind(new.needs_follow_up)
        .bind(&new.follow_up_text)
        .bind(&new.follow_up_type)
        .fetch_one(&mut *tx)
        .await?;

        recount(&mut tx, new.session_id).await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn list_responses(&self, session_id: Uuid) -> Result<Vec<ResponseRow>> {
        Ok(sqlx::query_as::<_, ResponseRow>(
            r#"
            SELECT r.* FROM interview_responses r
            JOIN interview_questions q ON q.id = r.question_id
            WHERE r.session_id = $1
            ORDER BY q.position
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_posting(&self, new: NewJobPosting) -> Result<JobPostingRow> {
        let row = sqlx::query_as::<_, JobPostingRow>(
            r#"
            INSERT INTO job_postings
                (id, title, description, budget, skills_required, deadline, url,
                 language, client, fetch_method, tos_safe, match_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.budget)
        .bind(&new.skills_required)
        .bind(new.deadline)
        .bind(&new.url)
        .bind(&new.language)
        .bind(&new.client)
        .bind(&new.fetch_method)
        .bind(new.tos_safe)
        .bind(new.match_score)
        .fetch_one(&self.pool)
        .await
        .context("inserting job posting")?;

        info!("Inserted job posting {}", row.id);
        Ok(row)
    }

    async fn get_posting(&self, id: Uuid) -> Result<Option<JobPostingRow>> {
        Ok(
            sqlx::query_as::<_, JobPostingRow>("SELECT * FROM job_postings WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_postings(&self, limit: i64) -> Result<Vec<JobPostingRow>> {
        Ok(sqlx::query_as::<_, JobPostingRow>(
            "SELECT * FROM job_postings ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_posting_score(&self, id: Uuid, score: f64) -> Result<Option<JobPostingRow>> {
        Ok(sqlx::query_as::<_, JobPostingRow>(
            "UPDATE job_postings SET match_score = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(score)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(sqlx::query_as::<_, StoreStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM chat_contexts)                                  AS total_contexts,
                (SELECT COUNT(*) FROM interview_sessions)                             AS total_sessions,
                (SELECT COUNT(*) FROM interview_sessions WHERE status = 'active')    AS active_sessions,
                (SELECT COUNT(*) FROM interview_sessions WHERE status = 'completed') AS completed_sessions,
                (SELECT COUNT(*) FROM interview_responses)                            AS total_responses,
                (SELECT COUNT(*) FROM job_postings)                                   AS total_postings
            "#,
        )
        .fetch_one(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations};
    use crate::store::testing::new_context;

    /// Live tests only run when `TEST_DATABASE_URL` points at a scratch database.
    async fn live_store() -> Option<PgStore> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        Some(PgStore::new(pool))
    }

    #[tokio::test]
    async fn test_concurrent_first_ingests_share_one_row() {
        let Some(store) = live_store().await else {
            return;
        };
        let url = format!("https://chat/{}", Uuid::new_v4());

        let (a, b) = tokio::join!(
            store.upsert_chat_context(new_context(Some(&url), &["first"])),
            store.upsert_chat_context(new_context(Some(&url), &["second"])),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let created = [&a, &b]
            .iter()
            .filter(|u| matches!(u, ContextUpsert::Created(_)))
            .count();
        assert_eq!(created, 1);
        assert_eq!(a.row().id, b.row().id);
    }

    #[tokio::test]
    async fn test_inactive_url_comes_back_frozen() {
        let Some(store) = live_store().await else {
            return;
        };
        let url = format!("https://chat/{}", Uuid::new_v4());

        let first = store
            .upsert_chat_context(new_context(Some(&url), &["hello"]))
            .await
            .unwrap();
        store.deactivate_chat_context(first.row().id).await.unwrap();

        let again = store
            .upsert_chat_context(new_context(Some(&url), &["hello again"]))
            .await
            .unwrap();
        match again {
            ContextUpsert::Frozen(row) => assert_eq!(row.total_messages, 1),
            other => panic!("expected frozen, got {other:?}"),
        }
    }
}
