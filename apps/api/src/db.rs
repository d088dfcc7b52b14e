use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connecting to PostgreSQL")?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the schema if it does not exist yet. Safe to run on every boot.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    // Chat contexts; url is the natural key when present
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_contexts (
            id UUID PRIMARY KEY,
            url TEXT UNIQUE,
            chat_title TEXT,
            project_title TEXT,
            client_name TEXT,
            participants TEXT[] NOT NULL DEFAULT '{}',
            messages JSONB NOT NULL DEFAULT '[]',
            total_messages INTEGER NOT NULL DEFAULT 0,
            extracted_topics TEXT[] NOT NULL DEFAULT '{}',
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            extracted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Sessions keep a weak link to their context
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interview_sessions (
            id UUID PRIMARY KEY,
            context_id UUID REFERENCES chat_contexts(id) ON DELETE SET NULL,
            session_name TEXT NOT NULL,
            candidate_name TEXT,
            interview_type TEXT NOT NULL DEFAULT 'general',
            difficulty TEXT NOT NULL DEFAULT 'medium',
            status TEXT NOT NULL DEFAULT 'active',
            total_questions INTEGER NOT NULL DEFAULT 0,
            total_responses INTEGER NOT NULL DEFAULT 0,
            avg_response_time DOUBLE PRECISION NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interview_questions (
            id UUID PRIMARY KEY,
            session_id UUID NOT NULL REFERENCES interview_sessions(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            question_text TEXT NOT NULL,
            question_type TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            related_topics TEXT[] NOT NULL DEFAULT '{}',
            generated_by_model TEXT NOT NULL,
            generation_confidence DOUBLE PRECISION NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            asked_at TIMESTAMPTZ,
            UNIQUE (session_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One response per question; resubmission replaces it
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interview_responses (
            id UUID PRIMARY KEY,
            question_id UUID NOT NULL UNIQUE REFERENCES interview_questions(id) ON DELETE CASCADE,
            session_id UUID NOT NULL REFERENCES interview_sessions(id) ON DELETE CASCADE,
            response_text TEXT NOT NULL,
            response_time_seconds DOUBLE PRECISION NOT NULL DEFAULT 0,
            sentiment_score DOUBLE PRECISION NOT NULL DEFAULT 0,
            relevance_score DOUBLE PRECISION NOT NULL DEFAULT 0,
            technical_accuracy DOUBLE PRECISION NOT NULL DEFAULT 0,
            analysis JSONB NOT NULL DEFAULT '{}',
            needs_follow_up BOOLEAN NOT NULL DEFAULT FALSE,
            follow_up_text TEXT,
            follow_up_type TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            analyzed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_responses_session ON interview_responses(session_id)",
    )
    .execute(pool)
    .await?;

    // Scraped job posts and their skill match score
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_postings (
            id UUID PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            budget TEXT NOT NULL DEFAULT '',
            skills_required TEXT[] NOT NULL DEFAULT '{}',
            deadline DATE,
            url TEXT,
            language TEXT NOT NULL DEFAULT '',
            client TEXT NOT NULL DEFAULT '',
            fetch_method TEXT NOT NULL DEFAULT 'manual',
            tos_safe BOOLEAN NOT NULL DEFAULT FALSE,
            match_score DOUBLE PRECISION NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database schema ready");
    Ok(())
}
