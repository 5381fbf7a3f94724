use crate::api_error::ApiError;
use crate::db::DbPool;
use crate::models::common::{ListResponse, PageQuery};
use crate::models::forum::{
    CreatePostRequest, CreateThreadRequest, ForumCategory, ForumPost, ForumThread,
    ModerateThreadRequest, PostResponse, ThreadDetailResponse, ThreadListItem,
};
use crate::service::user_service::fetch_user_summaries;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct ForumService {
    db_pool: DbPool,
}

impl ForumService {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }

    pub async fn list_categories(&self) -> Result<Vec<ForumCategory>, ApiError> {
        let categories = sqlx::query_as::<_, ForumCategory>(
            r#"
            SELECT c.id, c.name, c.description, c.position, COUNT(t.id) AS thread_count
            FROM forum_categories c
            LEFT JOIN forum_threads t ON t.category_id = c.id
            GROUP BY c.id
            ORDER BY c.position ASC, c.name ASC
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(categories)
    }

    /// Threads of a category, pinned first then most recently active.
    pub async fn list_threads(
        &self,
        category_id: Uuid,
        page: &PageQuery,
    ) -> Result<ListResponse<ThreadListItem>, ApiError> {
        self.ensure_category(category_id).await?;

        let threads = sqlx::query_as::<_, ForumThread>(
            r#"
            SELECT * FROM forum_threads
            WHERE category_id = $1
            ORDER BY is_pinned DESC, last_activity_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(category_id)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM forum_threads WHERE category_id = $1")
                .bind(category_id)
                .fetch_one(&self.db_pool)
                .await?;

        let author_ids: Vec<Uuid> = threads.iter().map(|t| t.author_id).collect();
        let authors = fetch_user_summaries(&self.db_pool, &author_ids).await?;

        let items = threads
            .into_iter()
            .map(|thread| ThreadListItem {
                author: authors.get(&thread.author_id).cloned(),
                thread,
            })
            .collect();

        Ok(ListResponse::new(items, total, page))
    }

    async fn ensure_category(&self, category_id: Uuid) -> Result<(), ApiError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM forum_categories WHERE id = $1)")
                .bind(category_id)
                .fetch_one(&self.db_pool)
                .await?;
        if !exists {
            return Err(ApiError::not_found("Forum category not found"));
        }
        Ok(())
    }

    async fn find_thread(&self, thread_id: Uuid) -> Result<ForumThread, ApiError> {
        sqlx::query_as::<_, ForumThread>("SELECT * FROM forum_threads WHERE id = $1")
            .bind(thread_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Thread not found"))
    }

    pub async fn create_thread(
        &self,
        author_id: Uuid,
        request: CreateThreadRequest,
    ) -> Result<ForumThread, ApiError> {
        request.validate()?;
        self.ensure_category(request.category_id).await?;

        let thread = sqlx::query_as::<_, ForumThread>(
            r#"
            INSERT INTO forum_threads (id, category_id, author_id, title, body)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.category_id)
        .bind(author_id)
        .bind(request.title.trim())
        .bind(&request.body)
        .fetch_one(&self.db_pool)
        .await?;

        info!(thread_id = %thread.id, category_id = %thread.category_id, author_id = %author_id, "Forum thread created");

        Ok(thread)
    }

    pub async fn get_thread(&self, thread_id: Uuid, page: &PageQuery) -> Result<ThreadDetailResponse, ApiError> {
        let thread = self.find_thread(thread_id).await?;

        let posts = sqlx::query_as::<_, ForumPost>(
            r#"
            SELECT * FROM forum_posts
            WHERE thread_id = $1
            ORDER BY created_at ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(thread_id)
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await?;

        let total_posts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM forum_posts WHERE thread_id = $1")
                .bind(thread_id)
                .fetch_one(&self.db_pool)
                .await?;

        let mut author_ids: Vec<Uuid> = posts.iter().map(|p| p.author_id).collect();
        author_ids.push(thread.author_id);
        let authors = fetch_user_summaries(&self.db_pool, &author_ids).await?;

        let posts = posts
            .into_iter()
            .map(|post| PostResponse {
                author: authors.get(&post.author_id).cloned(),
                post,
            })
            .collect();

        Ok(ThreadDetailResponse {
            author: authors.get(&thread.author_id).cloned(),
            thread,
            posts,
            total_posts,
            page: page.page(),
            per_page: page.per_page(),
        })
    }

    pub async fn reply(
        &self,
        thread_id: Uuid,
        author_id: Uuid,
        request: CreatePostRequest,
    ) -> Result<ForumPost, ApiError> {
        request.validate()?;

        let mut tx = self.db_pool.begin().await?;

        let locked: Option<bool> =
            sqlx::query_scalar("SELECT is_locked FROM forum_threads WHERE id = $1 FOR UPDATE")
                .bind(thread_id)
                .fetch_optional(&mut *tx)
                .await?;
        match locked {
            None => return Err(ApiError::not_found("Thread not found")),
            Some(true) => return Err(ApiError::forbidden("Thread is locked")),
            Some(false) => {}
        }

        let post = sqlx::query_as::<_, ForumPost>(
            r#"
            INSERT INTO forum_posts (id, thread_id, author_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(thread_id)
        .bind(author_id)
        .bind(&request.body)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE forum_threads
            SET reply_count = reply_count + 1, last_activity_at = $2
            WHERE id = $1
            "#,
        )
        .bind(thread_id)
        .bind(post.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(thread_id = %thread_id, post_id = %post.id, author_id = %author_id, "Forum reply posted");

        Ok(post)
    }

    /// Lock or pin a thread. Callers must already be moderators.
    pub async fn moderate_thread(
        &self,
        thread_id: Uuid,
        moderator_id: Uuid,
        request: ModerateThreadRequest,
    ) -> Result<ForumThread, ApiError> {
        let thread = sqlx::query_as::<_, ForumThread>(
            r#"
            UPDATE forum_threads SET
                is_locked = COALESCE($2, is_locked),
                is_pinned = COALESCE($3, is_pinned)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(thread_id)
        .bind(request.is_locked)
        .bind(request.is_pinned)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Thread not found"))?;

        info!(
            thread_id = %thread_id,
            moderator_id = %moderator_id,
            is_locked = thread.is_locked,
            is_pinned = thread.is_pinned,
            "Thread moderated"
        );

        Ok(thread)
    }

    pub async fn delete_post(&self, post_id: Uuid, user_id: Uuid, is_moderator: bool) -> Result<(), ApiError> {
        let mut tx = self.db_pool.begin().await?;

        let post = sqlx::query_as::<_, ForumPost>("SELECT * FROM forum_posts WHERE id = $1 FOR UPDATE")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Post not found"))?;

        if post.author_id != user_id && !is_moderator {
            return Err(ApiError::forbidden("You can only delete your own posts"));
        }

        sqlx::query("DELETE FROM forum_posts WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE forum_threads SET reply_count = GREATEST(reply_count - 1, 0) WHERE id = $1",
        )
        .bind(post.thread_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(post_id = %post_id, thread_id = %post.thread_id, deleted_by = %user_id, "Forum post deleted");
        Ok(())
    }
}
