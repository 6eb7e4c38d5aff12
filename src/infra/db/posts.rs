use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::pagination::PageWindow;
use crate::application::repos::{
    CreatePostParams, PostScope, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{AuthorSummary, GroupSummary, PostRecord};

use super::PostgresRepositories;
use super::util::{convert_count, map_sqlx_error};

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.image, \
     u.id AS author_id, u.username AS author_username, \
     u.first_name AS author_first_name, u.last_name AS author_last_name, \
     g.id AS group_id, g.title AS group_title, g.slug AS group_slug \
     FROM posts p \
     INNER JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id ";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    text: String,
    pub_date: OffsetDateTime,
    image: Option<String>,
    author_id: i64,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    group_id: Option<i64>,
    group_title: Option<String>,
    group_slug: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        let group = match (row.group_id, row.group_title, row.group_slug) {
            (Some(id), Some(title), Some(slug)) => Some(GroupSummary { id, title, slug }),
            _ => None,
        };

        Self {
            id: row.id,
            text: row.text,
            pub_date: row.pub_date,
            author: AuthorSummary {
                id: row.author_id,
                username: row.author_username,
                first_name: row.author_first_name,
                last_name: row.author_last_name,
            },
            group,
            image: row.image.filter(|path| !path.is_empty()),
        }
    }
}

fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: PostScope) {
    match scope {
        PostScope::All => {}
        PostScope::Group(group_id) => {
            qb.push(" WHERE p.group_id = ");
            qb.push_bind(group_id);
        }
        PostScope::Author(author_id) => {
            qb.push(" WHERE p.author_id = ");
            qb.push_bind(author_id);
        }
        PostScope::FollowedBy(user_id) => {
            qb.push(" WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ");
            qb.push_bind(user_id);
            qb.push(")");
        }
    }
}

impl PostgresRepositories {
    async fn load_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p");
        push_scope(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        convert_count(count)
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let offset = i64::try_from(window.offset)
            .map_err(|_| RepoError::InvalidInput {
                message: "page offset exceeds supported range".to_string(),
            })?;

        let mut qb = QueryBuilder::new(POST_SELECT);
        push_scope(&mut qb, scope);
        qb.push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        self.load_post(id).await
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO posts (text, author_id, group_id, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(params.text)
        .bind(params.author_id)
        .bind(params.group_id)
        .bind(params.image)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.load_post(id).await?.ok_or(RepoError::NotFound)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET text = $2, group_id = $3, image = $4
            WHERE id = $1
            "#,
        )
        .bind(params.id)
        .bind(params.text)
        .bind(params.group_id)
        .bind(params.image)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        self.load_post(params.id).await?.ok_or(RepoError::NotFound)
    }
}
