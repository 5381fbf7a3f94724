use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::blog::{
    slug_with_suffix, BlogComment, BlogListQuery, BlogPost, BlogPostResponse, CommentResponse,
    CreateBlogPostRequest, CreateCommentRequest, UpdateBlogPostRequest,
};
use crate::models::common::{ListResponse, PageQuery};
use crate::service::user_service::fetch_user_summaries;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

const SLUG_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct BlogService {
    db_pool: DbPool,
}

impl BlogService {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }

    // ========================================================================
    // POSTS
    // ========================================================================

    pub async fn list_published(
        &self,
        filter: &BlogListQuery,
        page: &PageQuery,
    ) -> Result<ListResponse<BlogPostResponse>, ApiError> {
        let posts = sqlx::query_as::<_, BlogPost>(
            r#"
            SELECT * FROM blog_posts
            WHERE is_published AND ($1::TEXT IS NULL OR $1 = ANY(tags))
            ORDER BY published_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&filter.tag)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM blog_posts WHERE is_published AND ($1::TEXT IS NULL OR $1 = ANY(tags))",
        )
        .bind(&filter.tag)
        .fetch_one(&self.db_pool)
        .await?;

        let author_ids: Vec<Uuid> = posts.iter().map(|p| p.author_id).collect();
        let authors = fetch_user_summaries(&self.db_pool, &author_ids).await?;

        let items = posts
            .into_iter()
            .map(|post| BlogPostResponse {
                author: authors.get(&post.author_id).cloned(),
                post,
            })
            .collect();

        Ok(ListResponse::new(items, total, page))
    }

    /// Slugs get a random hex suffix; a collision retries with a fresh one.
    pub async fn create_post(&self, author_id: Uuid, request: CreateBlogPostRequest) -> Result<BlogPost, ApiError> {
        request.validate()?;

        for attempt in 1..=SLUG_ATTEMPTS {
            let slug = slug_with_suffix(&request.title, rand::random::<u32>());

            let result = sqlx::query_as::<_, BlogPost>(
                r#"
                INSERT INTO blog_posts (id, author_id, slug, title, body, tags, is_published, published_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $7 THEN NOW() END)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(author_id)
            .bind(&slug)
            .bind(request.title.trim())
            .bind(&request.body)
            .bind(&request.tags)
            .bind(request.published)
            .fetch_one(&self.db_pool)
            .await;

            match result {
                Ok(post) => {
                    info!(post_id = %post.id, slug = %post.slug, author_id = %author_id, "Blog post created");
                    return Ok(post);
                }
                Err(e) => match ApiError::from_db_with_conflict(e, "Slug already taken") {
                    ApiError::Conflict(_) => {
                        warn!(slug = %slug, attempt = attempt, "Blog slug collision");
                    }
                    other => return Err(other),
                },
            }
        }

        Err(ApiError::conflict("Could not allocate a unique slug"))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<BlogPost, ApiError> {
        sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Blog post not found"))
    }

    /// Drafts are visible to their author only.
    pub async fn get_post(&self, slug: &str, viewer: Option<Uuid>) -> Result<BlogPostResponse, ApiError> {
        let post = self.find_by_slug(slug).await?;
        if !post.is_published && viewer != Some(post.author_id) {
            return Err(ApiError::not_found("Blog post not found"));
        }

        let authors = fetch_user_summaries(&self.db_pool, &[post.author_id]).await?;
        Ok(BlogPostResponse {
            author: authors.get(&post.author_id).cloned(),
            post,
        })
    }

    pub async fn update_post(
        &self,
        slug: &str,
        user_id: Uuid,
        request: UpdateBlogPostRequest,
    ) -> Result<BlogPost, ApiError> {
        request.validate()?;

        let post = self.find_by_slug(slug).await?;
        if post.author_id != user_id {
            return Err(ApiError::forbidden("Only the author can edit this post"));
        }

        // published_at is stamped on first publish and kept afterwards
        let updated = sqlx::query_as::<_, BlogPost>(
            r#"
            UPDATE blog_posts SET
                title = COALESCE($2, title),
                body = COALESCE($3, body),
                tags = COALESCE($4, tags),
                is_published = COALESCE($5, is_published),
                published_at = CASE
                    WHEN COALESCE($5, is_published) THEN COALESCE(published_at, NOW())
                    ELSE published_at
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(post.id)
        .bind(request.title.as_deref().map(str::trim))
        .bind(&request.body)
        .bind(&request.tags)
        .bind(request.published)
        .fetch_one(&self.db_pool)
        .await?;

        info!(post_id = %updated.id, is_published = updated.is_published, "Blog post updated");

        Ok(updated)
    }

    pub async fn delete_post(&self, slug: &str, user_id: Uuid, is_admin: bool) -> Result<(), ApiError> {
        let post = self.find_by_slug(slug).await?;
        if post.author_id != user_id && !is_admin {
            return Err(ApiError::forbidden("Only the author can delete this post"));
        }

        sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(post.id)
            .execute(&self.db_pool)
            .await?;

        info!(post_id = %post.id, deleted_by = %user_id, "Blog post deleted");
        Ok(())
    }

    // ========================================================================
    // COMMENTS
    // ========================================================================

    pub async fn list_comments(&self, slug: &str, viewer: Option<Uuid>) -> Result<Vec<CommentResponse>, ApiError> {
        let post = self.find_by_slug(slug).await?;
        if !post.is_published && viewer != Some(post.author_id) {
            return Err(ApiError::not_found("Blog post not found"));
        }

        let comments = sqlx::query_as::<_, BlogComment>(
            "SELECT * FROM blog_comments WHERE post_id = $1 ORDER BY created_at ASC",
        )
        .bind(post.id)
        .fetch_all(&self.db_pool)
        .await?;

        let author_ids: Vec<Uuid> = comments.iter().map(|c| c.author_id).collect();
        let authors = fetch_user_summaries(&self.db_pool, &author_ids).await?;

        Ok(comments
            .into_iter()
            .map(|comment| CommentResponse {
                author: authors.get(&comment.author_id).cloned(),
                comment,
            })
            .collect())
    }

    pub async fn add_comment(
        &self,
        slug: &str,
        author_id: Uuid,
        request: CreateCommentRequest,
    ) -> Result<BlogComment, ApiError> {
        request.validate()?;

        let post = self.find_by_slug(slug).await?;
        if !post.is_published {
            return Err(ApiError::bad_request("Comments are only allowed on published posts"));
        }

        let comment = sqlx::query_as::<_, BlogComment>(
            r#"
            INSERT INTO blog_comments (id, post_id, author_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post.id)
        .bind(author_id)
        .bind(&request.body)
        .fetch_one(&self.db_pool)
        .await?;

        info!(comment_id = %comment.id, post_id = %post.id, author_id = %author_id, "Blog comment added");

        Ok(comment)
    }
}
