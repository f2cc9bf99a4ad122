use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use geobuild_core::{new_id, sortable_ts, Page, PageParams};
use geobuild_sql::{Row, SQLError, SQLStore, Value};

use crate::error::ClientError;
use crate::model::{non_blank, Client, CreateClientRequest, UpdateClientRequest};

/// SQL schema for the clients table. Both customer keys are UNIQUE so that
/// concurrent creates and updates cannot produce duplicates.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS clients (
    id              TEXT PRIMARY KEY,
    customer_id     TEXT NOT NULL UNIQUE,
    customer_number TEXT NOT NULL UNIQUE,
    name            TEXT NOT NULL,
    email           TEXT,
    phone           TEXT,
    address         TEXT,
    project_name    TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT
);
CREATE INDEX IF NOT EXISTS idx_clients_created_at ON clients(created_at);
";

const COLUMNS: &str = "id, customer_id, customer_number, name, email, phone, address, \
                       project_name, created_at, updated_at";

/// Matches on name, customer number or project name.
const SEARCH_CLAUSE: &str = "(name LIKE ?1 ESCAPE '\\' OR customer_number LIKE ?1 ESCAPE '\\' \
                             OR project_name LIKE ?1 ESCAPE '\\')";

/// Rows returned by the quick search.
const SEARCH_LIMIT: i64 = 10;

/// Persistent storage for clients, backed by SQLStore (SQLite).
pub struct ClientStore {
    db: Arc<dyn SQLStore>,
}

impl ClientStore {
    /// Create a new ClientStore and initialise the schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ClientError> {
        db.exec_batch(SCHEMA)
            .map_err(|e| ClientError::Storage(format!("client schema init: {e}")))?;
        Ok(Self { db })
    }

    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    pub fn create(&self, req: CreateClientRequest) -> Result<Client, ClientError> {
        let (Some(customer_id), Some(customer_number), Some(name), Some(email)) = (
            non_blank(Some(req.customer_id.as_str())),
            non_blank(Some(req.customer_number.as_str())),
            non_blank(Some(req.name.as_str())),
            non_blank(Some(req.email.as_str())),
        ) else {
            return Err(ClientError::Validation(
                "Customer ID, Customer Name, Customer Number, and Customer Email are required."
                    .into(),
            ));
        };

        let now = Utc::now();
        let client = Client {
            id: new_id(),
            customer_id,
            customer_number,
            name,
            email: Some(email),
            phone: non_blank(req.phone.as_deref()),
            address: non_blank(req.address.as_deref()),
            project_name: non_blank(req.project_name.as_deref()),
            created_at: now,
            updated_at: Some(now),
        };

        self.db
            .exec(
                &format!(
                    "INSERT INTO clients ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)"
                ),
                &[
                    Value::from(client.id.as_str()),
                    Value::from(client.customer_id.as_str()),
                    Value::from(client.customer_number.as_str()),
                    Value::from(client.name.as_str()),
                    Value::from(client.email.clone()),
                    Value::from(client.phone.clone()),
                    Value::from(client.address.clone()),
                    Value::from(client.project_name.clone()),
                    Value::from(sortable_ts(&now)),
                ],
            )
            .map_err(|e| self.write_error(e, &client.customer_id, &client.id))?;

        info!(client_id = %client.id, customer_number = %client.customer_number, "client created");
        Ok(client)
    }

    pub fn get(&self, id: &str) -> Result<Client, ClientError> {
        self.find_one("id", id)?
            .ok_or_else(|| ClientError::NotFound(format!("Client with ID {id} not found")))
    }

    pub fn get_by_customer_number(&self, customer_number: &str) -> Result<Client, ClientError> {
        self.find_one("customer_number", customer_number)?.ok_or_else(|| {
            ClientError::NotFound(format!(
                "Client with customer number {customer_number} not found"
            ))
        })
    }

    /// Apply a partial update. Blank required fields keep the stored value;
    /// the optional contact fields are cleared when sent blank.
    pub fn update(&self, id: &str, req: UpdateClientRequest) -> Result<Client, ClientError> {
        let mut client = self.get(id)?;

        if let Some(v) = non_blank(req.customer_id.as_deref()) {
            client.customer_id = v;
        }
        if let Some(v) = non_blank(req.customer_number.as_deref()) {
            client.customer_number = v;
        }
        if let Some(v) = non_blank(req.name.as_deref()) {
            client.name = v;
        }
        if let Some(v) = non_blank(req.email.as_deref()) {
            client.email = Some(v);
        }
        if let Some(v) = req.phone.as_deref() {
            client.phone = non_blank(Some(v));
        }
        if let Some(v) = req.address.as_deref() {
            client.address = non_blank(Some(v));
        }
        if let Some(v) = req.project_name.as_deref() {
            client.project_name = non_blank(Some(v));
        }
        let now = Utc::now();
        client.updated_at = Some(now);

        let affected = self
            .db
            .exec(
                "UPDATE clients SET customer_id = ?1, customer_number = ?2, name = ?3, email = ?4, \
                 phone = ?5, address = ?6, project_name = ?7, updated_at = ?8 WHERE id = ?9",
                &[
                    Value::from(client.customer_id.as_str()),
                    Value::from(client.customer_number.as_str()),
                    Value::from(client.name.as_str()),
                    Value::from(client.email.clone()),
                    Value::from(client.phone.clone()),
                    Value::from(client.address.clone()),
                    Value::from(client.project_name.clone()),
                    Value::from(sortable_ts(&now)),
                    Value::from(id),
                ],
            )
            .map_err(|e| self.write_error(e, &client.customer_id, id))?;

        if affected == 0 {
            return Err(ClientError::NotFound(format!("Client with ID {id} not found")));
        }
        info!(client_id = %id, "client updated");
        Ok(client)
    }

    pub fn delete(&self, id: &str) -> Result<(), ClientError> {
        let affected = self
            .db
            .exec("DELETE FROM clients WHERE id = ?1", &[Value::from(id)])?;

        if affected == 0 {
            return Err(ClientError::NotFound(format!("Client with ID {id} not found")));
        }
        info!(client_id = %id, "client deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // List / Query
    // -----------------------------------------------------------------------

    /// Newest first, optionally filtered by a substring of name, customer
    /// number or project name.
    pub fn list(
        &self,
        search: Option<&str>,
        params: &PageParams,
    ) -> Result<Page<Client>, ClientError> {
        let mut where_clause = String::new();
        let mut filter: Vec<Value> = Vec::new();
        if let Some(term) = search.filter(|s| !s.is_empty()) {
            where_clause = format!(" WHERE {SEARCH_CLAUSE}");
            filter.push(Value::from(like_pattern(term)));
        }

        let count_rows = self.db.query(
            &format!("SELECT COUNT(*) AS cnt FROM clients{where_clause}"),
            &filter,
        )?;
        let total = count_rows
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        let idx = filter.len() + 1;
        let mut page_values = filter;
        page_values.push(Value::Integer(params.limit() as i64));
        page_values.push(Value::Integer(params.offset() as i64));

        let rows = self.db.query(
            &format!(
                "SELECT {COLUMNS} FROM clients{where_clause} ORDER BY created_at DESC \
                 LIMIT ?{idx} OFFSET ?{}",
                idx + 1
            ),
            &page_values,
        )?;

        let items = rows.iter().map(row_to_client).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, params))
    }

    /// Top matches for a type-ahead box. Empty query returns nothing.
    pub fn search(&self, q: &str) -> Result<Vec<Client>, ClientError> {
        if q.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.db.query(
            &format!("SELECT {COLUMNS} FROM clients WHERE {SEARCH_CLAUSE} LIMIT ?2"),
            &[Value::from(like_pattern(q)), Value::Integer(SEARCH_LIMIT)],
        )?;
        rows.iter().map(row_to_client).collect()
    }

    /// SQLite names whichever UNIQUE index it hits first. When the write
    /// collides, a taken customer id is reported ahead of the number.
    fn write_error(&self, e: SQLError, customer_id: &str, own_id: &str) -> ClientError {
        if e.unique_violation().is_none() {
            return ClientError::Storage(e.to_string());
        }
        match self.find_one("customer_id", customer_id) {
            Ok(Some(other)) if other.id != own_id => ClientError::DuplicateCustomerId,
            _ => ClientError::from_write(e),
        }
    }

    fn find_one(&self, column: &str, value: &str) -> Result<Option<Client>, ClientError> {
        let rows = self.db.query(
            &format!("SELECT {COLUMNS} FROM clients WHERE {column} = ?1"),
            &[Value::from(value)],
        )?;
        rows.first().map(row_to_client).transpose()
    }
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, ClientError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ClientError::Internal(format!("bad timestamp {raw:?}: {e}")))
}

fn row_to_client(row: &Row) -> Result<Client, ClientError> {
    let text = |name: &str| -> Result<String, ClientError> {
        row.get_str(name)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Internal(format!("clients.{name} missing")))
    };
    let opt = |name: &str| row.get_str(name).map(str::to_string);

    Ok(Client {
        id: text("id")?,
        customer_id: text("customer_id")?,
        customer_number: text("customer_number")?,
        name: text("name")?,
        email: opt("email"),
        phone: opt("phone"),
        address: opt("address"),
        project_name: opt("project_name"),
        created_at: parse_ts(&text("created_at")?)?,
        updated_at: row.get_str("updated_at").map(parse_ts).transpose()?,
    })
}

#[cfg(test)]
pub(crate) fn test_store() -> ClientStore {
    let db = Arc::new(geobuild_sql::SqliteStore::open_in_memory().unwrap());
    ClientStore::new(db).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(customer_id: &str, customer_number: &str, name: &str) -> CreateClientRequest {
        CreateClientRequest {
            customer_id: customer_id.into(),
            customer_number: customer_number.into(),
            name: name.into(),
            email: format!("{customer_id}@example.com"),
            project_name: Some("Villa".into()),
            ..Default::default()
        }
    }

    #[test]
    fn create_trims_and_reads_back() {
        let store = test_store();
        let created = store
            .create(CreateClientRequest {
                customer_id: "  C-1 ".into(),
                customer_number: " 0001 ".into(),
                name: " Acme ".into(),
                email: " acme@example.com ".into(),
                phone: Some("   ".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(created.customer_id, "C-1");
        assert_eq!(created.customer_number, "0001");
        assert_eq!(created.phone, None);

        let loaded = store.get(&created.id).unwrap();
        assert_eq!(loaded.name, "Acme");
        assert_eq!(loaded.email.as_deref(), Some("acme@example.com"));
        assert_eq!(loaded.created_at.timestamp(), created.created_at.timestamp());
        assert_eq!(store.get_by_customer_number("0001").unwrap().id, created.id);
    }

    #[test]
    fn create_requires_all_keys() {
        let store = test_store();
        let mut r = req("C-1", "0001", "Acme");
        r.email = " ".into();
        assert!(matches!(store.create(r), Err(ClientError::Validation(_))));
    }

    #[test]
    fn duplicate_keys_conflict_with_specific_message() {
        let store = test_store();
        store.create(req("C-1", "0001", "Acme")).unwrap();

        let err = store.create(req("C-1", "0002", "Other")).unwrap_err();
        assert_eq!(err.to_string(), "Customer ID already exists.");

        let err = store.create(req("C-2", "0001", "Other")).unwrap_err();
        assert_eq!(err.to_string(), "Customer Number already exists.");
    }

    #[test]
    fn both_keys_taken_reports_customer_id() {
        let store = test_store();
        let a = store.create(req("C-1", "0001", "Acme")).unwrap();
        let b = store.create(req("C-2", "0002", "Beta")).unwrap();

        let err = store.create(req("C-1", "0001", "Again")).unwrap_err();
        assert!(matches!(err, ClientError::DuplicateCustomerId));

        let clash = UpdateClientRequest {
            customer_id: Some("C-1".into()),
            customer_number: Some("0001".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(&b.id, clash),
            Err(ClientError::DuplicateCustomerId)
        ));

        // Own customer id plus someone else's number is a number clash.
        let clash = UpdateClientRequest {
            customer_number: Some("0002".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(&a.id, clash),
            Err(ClientError::DuplicateCustomerNumber)
        ));
    }

    #[test]
    fn huge_page_lists_nothing() {
        let store = test_store();
        store.create(req("C-1", "0001", "Acme")).unwrap();
        let params = PageParams { page: usize::MAX, page_size: 10 };
        let page = store.list(None, &params).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
    }

    #[test]
    fn update_checks_uniqueness_against_other_records_only() {
        let store = test_store();
        let a = store.create(req("C-1", "0001", "Acme")).unwrap();
        store.create(req("C-2", "0002", "Beta")).unwrap();

        // Re-sending own keys is fine.
        let same = UpdateClientRequest {
            customer_id: Some("C-1".into()),
            customer_number: Some("0001".into()),
            name: Some("Acme Ltd".into()),
            ..Default::default()
        };
        assert_eq!(store.update(&a.id, same).unwrap().name, "Acme Ltd");

        let clash = UpdateClientRequest {
            customer_number: Some("0002".into()),
            ..Default::default()
        };
        assert!(matches!(
            store.update(&a.id, clash),
            Err(ClientError::DuplicateCustomerNumber)
        ));
        assert_eq!(store.get(&a.id).unwrap().customer_number, "0001");
    }

    #[test]
    fn update_blank_optional_clears_it() {
        let store = test_store();
        let a = store.create(req("C-1", "0001", "Acme")).unwrap();
        let updated = store
            .update(
                &a.id,
                UpdateClientRequest {
                    project_name: Some("".into()),
                    name: Some("  ".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.project_name, None);
        assert_eq!(updated.name, "Acme");
    }

    #[test]
    fn list_filters_and_pages() {
        let store = test_store();
        for i in 0..15 {
            store
                .create(req(&format!("C-{i}"), &format!("{i:04}"), &format!("Client {i}")))
                .unwrap();
        }
        store.create(req("X-1", "9999", "Zebra 50%")).unwrap();

        let page = store
            .list(None, &PageParams { page: 2, page_size: 10 })
            .unwrap();
        assert_eq!(page.total, 16);
        assert_eq!(page.items.len(), 6);
        assert_eq!(page.total_pages, 2);

        let page = store.list(Some("zebra"), &PageParams::default()).unwrap();
        assert_eq!(page.total, 1);

        // `%` is literal, not a wildcard.
        let page = store.list(Some("0%"), &PageParams::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].customer_number, "9999");
    }

    #[test]
    fn quick_search_caps_results() {
        let store = test_store();
        assert!(store.search("").unwrap().is_empty());
        for i in 0..12 {
            store
                .create(req(&format!("C-{i}"), &format!("{i:04}"), "Same Name"))
                .unwrap();
        }
        assert_eq!(store.search("same").unwrap().len(), 10);
    }

    #[test]
    fn delete_then_not_found() {
        let store = test_store();
        let a = store.create(req("C-1", "0001", "Acme")).unwrap();
        store.delete(&a.id).unwrap();
        assert!(matches!(store.get(&a.id), Err(ClientError::NotFound(_))));
        assert!(matches!(store.delete(&a.id), Err(ClientError::NotFound(_))));
    }
}
