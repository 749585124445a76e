use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use models::{Contract, ContractAttachment, ContractStatus, NewContract, User};
use sqlx::{PgConnection, Pool, Postgres};
use std::collections::HashMap;

/// Inclusive bounds on a contract's `valid_till`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidTillWindow {
    pub not_before: Option<NaiveDate>,
    pub not_after: Option<NaiveDate>,
}

impl ValidTillWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.not_before.map_or(true, |bound| date >= bound)
            && self.not_after.map_or(true, |bound| date <= bound)
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, user_id: i64) -> anyhow::Result<Option<User>>;

    async fn company_exists(&self, company_id: i64) -> anyhow::Result<bool>;
}

/// Contract persistence. Every lookup is scoped to one company.
#[async_trait]
pub trait ContractRepository: Send + Sync {
    async fn client_name(&self, company_id: i64, client_id: i64) -> anyhow::Result<Option<String>>;

    async fn location_name(
        &self,
        company_id: i64,
        location_id: i64,
    ) -> anyhow::Result<Option<String>>;

    async fn rate_card_name(
        &self,
        company_id: i64,
        rate_card_id: i64,
    ) -> anyhow::Result<Option<String>>;

    /// Insert the contract and one attachment row per stored file path,
    /// atomically.
    async fn create_contract(
        &self,
        contract: &NewContract,
        attachment_paths: &[String],
    ) -> anyhow::Result<Contract>;

    async fn list_contracts(
        &self,
        company_id: i64,
        window: ValidTillWindow,
    ) -> anyhow::Result<Vec<Contract>>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    is_superuser: bool,
    is_active: bool,
    company_id: Option<i64>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            is_superuser: row.is_superuser,
            is_active: row.is_active,
            company_id: row.company_id,
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_user(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
                SELECT u.id, u.username, u.is_superuser, u.is_active, s.company_id
                FROM users u
                LEFT JOIN staffs s ON s.user_id = u.id
                WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("loading user")?;

        Ok(row.map(User::from))
    }

    async fn company_exists(&self, company_id: i64) -> anyhow::Result<bool> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM companies WHERE id = $1)"#)
                .bind(company_id)
                .fetch_one(&self.pool)
                .await
                .context("checking company")?;

        Ok(exists)
    }
}

#[derive(Clone)]
pub struct PgContractRepository {
    pool: Pool<Postgres>,
}

impl PgContractRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn name_in_company(
        &self,
        sql: &'static str,
        company_id: i64,
        id: i64,
    ) -> anyhow::Result<Option<String>> {
        let name: Option<String> = sqlx::query_scalar(sql)
            .bind(id)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    async fn attachments_for(
        conn: &mut PgConnection,
        contract_ids: &[i64],
    ) -> anyhow::Result<HashMap<i64, Vec<ContractAttachment>>> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            r#"
                SELECT id, contract_id, file_path
                FROM contract_attachments
                WHERE contract_id = ANY($1)
                ORDER BY id
            "#,
        )
        .bind(contract_ids)
        .fetch_all(&mut *conn)
        .await
        .context("loading contract attachments")?;

        let mut grouped: HashMap<i64, Vec<ContractAttachment>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.contract_id)
                .or_default()
                .push(ContractAttachment {
                    id: row.id,
                    contract_id: row.contract_id,
                    file_path: row.file_path,
                });
        }
        Ok(grouped)
    }

    /// Joined contract rows plus attachments, read on `conn` so a caller
    /// holding a transaction sees its own uncommitted inserts.
    async fn fetch_rows(
        conn: &mut PgConnection,
        company_id: i64,
        contract_id: Option<i64>,
        window: ValidTillWindow,
    ) -> anyhow::Result<Vec<Contract>> {
        let rows = sqlx::query_as::<_, ContractRow>(
            r#"
                SELECT
                    c.id,
                    c.company_id,
                    c.client_id,
                    cl.client_name,
                    c.location_id,
                    l.location_name,
                    c.rate_card_id,
                    r.card_name AS rate_card_name,
                    c.contract_no,
                    c.valid_from,
                    c.valid_till,
                    c.contract_status
                FROM contracts c
                JOIN clients cl ON cl.id = c.client_id
                JOIN locations l ON l.id = c.location_id
                JOIN rate_cards r ON r.id = c.rate_card_id
                WHERE c.company_id = $1
                  AND ($2::BIGINT IS NULL OR c.id = $2)
                  AND ($3::DATE IS NULL OR c.valid_till >= $3)
                  AND ($4::DATE IS NULL OR c.valid_till <= $4)
                ORDER BY c.id
            "#,
        )
        .bind(company_id)
        .bind(contract_id)
        .bind(window.not_before)
        .bind(window.not_after)
        .fetch_all(&mut *conn)
        .await
        .context("loading contracts")?;

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut attachments = Self::attachments_for(conn, &ids).await?;

        rows.into_iter()
            .map(|row| {
                let files = attachments.remove(&row.id).unwrap_or_default();
                row.into_contract(files)
            })
            .collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttachmentRow {
    id: i64,
    contract_id: i64,
    file_path: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ContractRow {
    id: i64,
    company_id: i64,
    client_id: i64,
    client_name: String,
    location_id: i64,
    location_name: String,
    rate_card_id: i64,
    rate_card_name: String,
    contract_no: String,
    valid_from: NaiveDate,
    valid_till: NaiveDate,
    contract_status: String,
}

impl ContractRow {
    fn into_contract(self, attachments: Vec<ContractAttachment>) -> anyhow::Result<Contract> {
        let status = self
            .contract_status
            .parse::<ContractStatus>()
            .map_err(anyhow::Error::msg)?;

        Ok(Contract {
            id: self.id,
            company_id: self.company_id,
            client_id: self.client_id,
            client_name: self.client_name,
            location_id: self.location_id,
            location_name: self.location_name,
            rate_card_id: self.rate_card_id,
            rate_card_name: self.rate_card_name,
            contract_no: self.contract_no,
            valid_from: self.valid_from,
            valid_till: self.valid_till,
            status,
            attachments,
        })
    }
}

#[async_trait]
impl ContractRepository for PgContractRepository {
    async fn client_name(&self, company_id: i64, client_id: i64) -> anyhow::Result<Option<String>> {
        self.name_in_company(
            r#"SELECT client_name FROM clients WHERE id = $1 AND company_id = $2"#,
            company_id,
            client_id,
        )
        .await
        .context("looking up client")
    }

    async fn location_name(
        &self,
        company_id: i64,
        location_id: i64,
    ) -> anyhow::Result<Option<String>> {
        self.name_in_company(
            r#"SELECT location_name FROM locations WHERE id = $1 AND company_id = $2"#,
            company_id,
            location_id,
        )
        .await
        .context("looking up location")
    }

    async fn rate_card_name(
        &self,
        company_id: i64,
        rate_card_id: i64,
    ) -> anyhow::Result<Option<String>> {
        self.name_in_company(
            r#"SELECT card_name FROM rate_cards WHERE id = $1 AND company_id = $2"#,
            company_id,
            rate_card_id,
        )
        .await
        .context("looking up rate card")
    }

    async fn create_contract(
        &self,
        contract: &NewContract,
        attachment_paths: &[String],
    ) -> anyhow::Result<Contract> {
        let mut tx = self.pool.begin().await?;

        let contract_id: i64 = sqlx::query_scalar(
            r#"
                INSERT INTO contracts
                    (company_id, client_id, location_id, rate_card_id,
                     contract_no, valid_from, valid_till, contract_status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
            "#,
        )
        .bind(contract.company_id)
        .bind(contract.client_id)
        .bind(contract.location_id)
        .bind(contract.rate_card_id)
        .bind(&contract.contract_no)
        .bind(contract.valid_from)
        .bind(contract.valid_till)
        .bind(contract.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .context("inserting contract")?;

        for path in attachment_paths {
            sqlx::query(
                r#"INSERT INTO contract_attachments (contract_id, file_path) VALUES ($1, $2)"#,
            )
            .bind(contract_id)
            .bind(path)
            .execute(&mut *tx)
            .await
            .context("inserting contract attachment")?;
        }

        let created = Self::fetch_rows(
            &mut tx,
            contract.company_id,
            Some(contract_id),
            ValidTillWindow::default(),
        )
        .await?
        .pop()
        .with_context(|| format!("contract {contract_id} missing after insert"))?;

        tx.commit().await?;
        Ok(created)
    }

    async fn list_contracts(
        &self,
        company_id: i64,
        window: ValidTillWindow,
    ) -> anyhow::Result<Vec<Contract>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_rows(&mut conn, company_id, None, window).await
    }
}
