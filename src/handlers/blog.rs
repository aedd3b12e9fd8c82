// src/handlers/blog.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        blog::{BLOG_COLUMNS, BlogListParams, BlogPost, BlogSummary, CreateBlogRequest, UpdateBlogRequest},
        pagination::{Page, Paginated},
    },
    utils::{
        html::{clean_html, excerpt, slugify},
        jwt::AuthUser,
    },
};

const EXCERPT_CHARS: usize = 200;

fn slug_from(source: &str) -> Result<String, AppError> {
    let slug = slugify(source);
    if slug.is_empty() {
        return Err(AppError::BadRequest(
            "Slug must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(slug)
}

fn clean_tags(tags: &[String]) -> Vec<String> {
    tags.iter().map(|t| t.trim().to_lowercase()).collect()
}

/// Lists published posts, newest first. Filter by tag or title search.
pub async fn list_posts(
    State(pool): State<PgPool>,
    Query(params): Query<BlogListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = Page::new(params.page, params.limit);
    let tag = params.tag.as_deref().map(|t| t.trim().to_lowercase());
    let pattern = params.q.as_deref().map(|q| format!("%{}%", q.trim()));

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM blog_posts
         WHERE is_published = TRUE
           AND ($1::TEXT IS NULL OR tags @> jsonb_build_array($1::TEXT))
           AND ($2::TEXT IS NULL OR title ILIKE $2)",
    )
    .bind(tag.as_deref())
    .bind(pattern.as_deref())
    .fetch_one(&pool)
    .await?;

    let posts = sqlx::query_as::<_, BlogSummary>(
        "SELECT id, slug, title, excerpt, tags, views, published_at FROM blog_posts
         WHERE is_published = TRUE
           AND ($1::TEXT IS NULL OR tags @> jsonb_build_array($1::TEXT))
           AND ($2::TEXT IS NULL OR title ILIKE $2)
         ORDER BY published_at DESC NULLS LAST, id DESC
         LIMIT $3 OFFSET $4",
    )
    .bind(tag.as_deref())
    .bind(pattern.as_deref())
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list blog posts: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(Paginated::new(posts, total, page)))
}

/// Reads a published post and counts the view in the same statement.
pub async fn get_post(
    State(pool): State<PgPool>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let post = sqlx::query_as::<_, BlogPost>(&format!(
        "UPDATE blog_posts SET views = views + 1
         WHERE slug = $1 AND is_published = TRUE
         RETURNING {BLOG_COLUMNS}"
    ))
    .bind(&slug)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

/// Creates a post.
///
/// * The slug comes from the title unless one is given.
/// * Content is sanitized with ammonia before it is stored.
/// * Publishing stamps `published_at`.
pub async fn create_post(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreateBlogRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let slug = slug_from(payload.slug.as_deref().unwrap_or(&payload.title))?;
    let content = clean_html(&payload.content);
    let summary = match payload.excerpt.as_deref() {
        Some(text) => excerpt(text, EXCERPT_CHARS),
        None => excerpt(&content, EXCERPT_CHARS),
    };

    let post = sqlx::query_as::<_, BlogPost>(&format!(
        "INSERT INTO blog_posts (slug, title, excerpt, content, tags, author_id, is_published, published_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $7 THEN NOW() ELSE NULL END)
         RETURNING {BLOG_COLUMNS}"
    ))
    .bind(&slug)
    .bind(payload.title.trim())
    .bind(&summary)
    .bind(&content)
    .bind(SqlJson(clean_tags(&payload.tags)))
    .bind(user.id)
    .bind(payload.is_published)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, format!("Slug '{slug}' is already taken")))?;

    tracing::info!(post_id = post.id, slug = %post.slug, "blog post created");

    Ok((StatusCode::CREATED, Json(post)))
}

/// Updates a post. A new slug is only taken when one is sent; `published_at`
/// is set the first time the post is published and kept afterwards.
pub async fn update_post(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateBlogRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let slug = payload.slug.as_deref().map(slug_from).transpose()?;
    let content = payload.content.as_deref().map(clean_html);
    let summary = match (payload.excerpt.as_deref(), content.as_deref()) {
        (Some(text), _) => Some(excerpt(text, EXCERPT_CHARS)),
        (None, Some(body)) => Some(excerpt(body, EXCERPT_CHARS)),
        (None, None) => None,
    };
    let tags = payload.tags.as_deref().map(clean_tags).map(SqlJson);

    let post = sqlx::query_as::<_, BlogPost>(&format!(
        "UPDATE blog_posts SET
            slug = COALESCE($1, slug),
            title = COALESCE($2, title),
            excerpt = COALESCE($3, excerpt),
            content = COALESCE($4, content),
            tags = COALESCE($5, tags),
            is_published = COALESCE($6, is_published),
            published_at = CASE
                WHEN COALESCE($6, is_published) AND published_at IS NULL THEN NOW()
                ELSE published_at
            END,
            updated_at = NOW()
         WHERE id = $7
         RETURNING {BLOG_COLUMNS}"
    ))
    .bind(slug.as_deref())
    .bind(payload.title.as_deref().map(str::trim))
    .bind(summary.as_deref())
    .bind(content.as_deref())
    .bind(tags)
    .bind(payload.is_published)
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, "Slug is already taken"))?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

pub async fn delete_post(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
