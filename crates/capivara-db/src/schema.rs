//! Relational schema administration.
//!
//! Three tables mirror the document store:
//!
//! - `usuarios` -- registered users
//! - `jogos` -- game sessions
//! - `participantes_jogo` -- seat assignments linking the two
//!
//! Every function here is best-effort: it runs its statements in order and
//! reports how many the client accepted.

use crate::executor::ExecutionError;
use crate::session::RelationalSession;
use crate::statement::Statement;

const CREATE_USUARIOS: &str = "\
usuarios (
    id_usuario SERIAL PRIMARY KEY,
    nome_usuario VARCHAR(50) UNIQUE NOT NULL,
    nome_completo VARCHAR(100) NOT NULL,
    email VARCHAR(100) UNIQUE NOT NULL,
    senha_hash VARCHAR(255) NOT NULL,
    data_cadastro TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    ativo BOOLEAN DEFAULT TRUE
)";

const CREATE_JOGOS: &str = "\
jogos (
    id_jogo SERIAL PRIMARY KEY,
    numero_jogadores INTEGER NOT NULL CHECK (numero_jogadores BETWEEN 2 AND 4),
    data_inicio TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    status VARCHAR(20) DEFAULT 'em_andamento',
    pontos_meta INTEGER DEFAULT 50
)";

const CREATE_PARTICIPANTES: &str = "\
participantes_jogo (
    id_participante SERIAL PRIMARY KEY,
    id_jogo INTEGER REFERENCES jogos(id_jogo),
    id_usuario INTEGER REFERENCES usuarios(id_usuario),
    posicao_mesa INTEGER,
    pontos_acumulados INTEGER DEFAULT 0
)";

/// Users seeded by [`setup_database`]: login, full name, email, hash.
const SEED_USERS: [(&str, &str, &str, &str); 4] = [
    ("admin", "Administrator", "admin@capivara.com", "hash123"),
    ("joao", "João Estudante", "joao@email.com", "hash456"),
    ("maria", "Maria Silva", "maria@email.com", "hash789"),
    ("pedro", "Pedro Santos", "pedro@email.com", "hash101"),
];

/// Lists the tables of the public schema.
pub const STRUCTURE_QUERY: &str = "\
SELECT table_name, table_type FROM information_schema.tables \
WHERE table_schema = 'public' ORDER BY table_name";

/// Trivial round trip used to check connectivity.
pub const CONNECTION_TEST_QUERY: &str = "SELECT 'connection ok' AS status, current_timestamp AS checked_at";

/// How many statements of a batch were attempted and accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaReport {
    /// Statements handed to the executor.
    pub attempted: usize,
    /// Statements the client accepted.
    pub succeeded: usize,
}

impl SchemaReport {
    /// Whether every attempted statement was accepted.
    pub const fn all_succeeded(&self) -> bool {
        self.attempted == self.succeeded
    }

    fn record(&mut self, result: &Result<String, ExecutionError>) {
        self.attempted = self.attempted.saturating_add(1);
        if result.is_ok() {
            self.succeeded = self.succeeded.saturating_add(1);
        }
    }
}

/// `CREATE TABLE` statements for all three tables, parents first.
pub fn create_table_statements(if_not_exists: bool) -> Vec<Statement> {
    let prefix = if if_not_exists {
        "CREATE TABLE IF NOT EXISTS"
    } else {
        "CREATE TABLE"
    };
    [CREATE_USUARIOS, CREATE_JOGOS, CREATE_PARTICIPANTES]
        .into_iter()
        .map(|body| Statement::new(format!("{prefix} {body}")))
        .collect()
}

/// `DROP TABLE` statements, children first.
pub fn drop_table_statements() -> Vec<Statement> {
    ["participantes_jogo", "jogos", "usuarios"]
        .into_iter()
        .map(|table| Statement::new(format!("DROP TABLE IF EXISTS {table} CASCADE")))
        .collect()
}

/// Insert statements for the sample accounts.
pub fn seed_user_statements() -> Vec<Statement> {
    SEED_USERS
        .into_iter()
        .map(|(username, full_name, email, hash)| {
            Statement::new(
                "INSERT INTO usuarios (nome_usuario, nome_completo, email, senha_hash) \
                 VALUES (:'nome_usuario', :'nome_completo', :'email', :'senha_hash')",
            )
            .bind("nome_usuario", username)
            .bind("nome_completo", full_name)
            .bind("email", email)
            .bind("senha_hash", hash)
        })
        .collect()
}

/// Create the application database, rebuild the tables, and seed users.
///
/// The `CREATE DATABASE` step runs against the maintenance database and is
/// expected to fail when the database already exists; the remaining steps
/// run regardless.
pub async fn setup_database(session: &mut RelationalSession) -> SchemaReport {
    let mut report = SchemaReport::default();

    let create = Statement::new("CREATE DATABASE :\"database\"").bind("database", session.database());
    let result = session.execute_maintenance(&create).await;
    if let Err(e) = &result {
        tracing::info!(error = %e, "Database creation skipped");
    }
    report.record(&result);

    let statements = drop_table_statements()
        .into_iter()
        .chain(create_table_statements(false))
        .chain(seed_user_statements());
    for statement in statements {
        let result = session.execute(&statement).await;
        report.record(&result);
    }

    tracing::info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        "Relational setup finished"
    );
    report
}

/// Create any missing tables without touching existing data.
pub async fn ensure_tables(session: &mut RelationalSession) -> SchemaReport {
    let mut report = SchemaReport::default();
    for statement in create_table_statements(true) {
        let result = session.execute(&statement).await;
        report.record(&result);
    }
    tracing::debug!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        "Table check finished"
    );
    report
}

/// List the application database's tables.
///
/// # Errors
///
/// Returns the executor's error if the query fails.
pub async fn check_structure(session: &mut RelationalSession) -> Result<String, ExecutionError> {
    session.execute(&Statement::new(STRUCTURE_QUERY)).await
}

/// Run a trivial query against the maintenance database.
///
/// # Errors
///
/// Returns the executor's error if the query fails.
pub async fn test_connection(session: &mut RelationalSession) -> Result<String, ExecutionError> {
    session
        .execute_maintenance(&Statement::new(CONNECTION_TEST_QUERY))
        .await
}
