use sqlx::PgPool;

use tbase_core::DatabaseError;

use super::decode::map_sqlx_error;

#[derive(Debug, sqlx::FromRow)]
pub struct RawTable {
    pub schema: String,
    pub name: String,
    pub column_count: i64,
}

pub async fn list_tables(
    pool: &PgPool,
    schema: Option<&str>,
) -> Result<Vec<RawTable>, DatabaseError> {
    sqlx::query_as::<_, RawTable>(
        r#"
        select
          t.table_schema::text as schema,
          t.table_name::text as name,
          count(c.column_name) as column_count
        from information_schema.tables t
        left join information_schema.columns c
          on c.table_schema = t.table_schema
         and c.table_name = t.table_name
        where t.table_type = 'BASE TABLE'
          and t.table_schema not in ('pg_catalog', 'information_schema')
          and ($1::text is null or t.table_schema = $1)
        group by t.table_schema, t.table_name
        order by t.table_schema, t.table_name
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await
    .map_err(|err| map_sqlx_error(&err, &[]))
}

#[derive(Debug, sqlx::FromRow)]
pub struct RawColumn {
    pub ordinal_position: i32,
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default: Option<String>,
}

pub async fn list_columns(
    pool: &PgPool,
    schema: &str,
    table: &str,
) -> Result<Vec<RawColumn>, DatabaseError> {
    sqlx::query_as::<_, RawColumn>(
        r#"
        select
          c.ordinal_position::int4 as ordinal_position,
          c.column_name::text as name,
          c.data_type::text as data_type,
          (c.is_nullable = 'YES') as is_nullable,
          c.column_default::text as "default"
        from information_schema.columns c
        where c.table_schema = $1
          and c.table_name = $2
        order by c.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|err| map_sqlx_error(&err, &[]))
}

#[derive(Debug, sqlx::FromRow)]
pub struct RawKeyColumn {
    pub schema: String,
    pub name: String,
    pub key_column: String,
}

pub async fn list_key_columns(
    pool: &PgPool,
    schema: &str,
    key_pattern: &str,
) -> Result<Vec<RawKeyColumn>, DatabaseError> {
    sqlx::query_as::<_, RawKeyColumn>(
        r#"
        select
          c.table_schema::text as schema,
          c.table_name::text as name,
          c.column_name::text as key_column
        from information_schema.columns c
        join information_schema.tables t
          on t.table_schema = c.table_schema
         and t.table_name = c.table_name
        where t.table_type = 'BASE TABLE'
          and c.table_schema = $1
          and c.column_name ilike $2
        order by c.table_name, c.ordinal_position
        "#,
    )
    .bind(schema)
    .bind(key_pattern)
    .fetch_all(pool)
    .await
    .map_err(|err| map_sqlx_error(&err, &[]))
}
