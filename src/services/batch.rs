//! Batch service
//!
//! Applies a file of deposits, withdrawals, transfers, account openings and
//! nickname changes as one unit. Operations run in file order against a
//! scratch copy of the ledger while the write lock is held; the copy replaces
//! the ledger only when every operation succeeded. A preview runs the same
//! checks and always discards the copy.
//!
//! CSV batches use the header [`CSV_HEADER`] and may carry `#` comment
//! lines. JSON batches hold an `operations` array of
//! `{"operation_type": ..., "parameters": {...}}` objects.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audit::{AuditEntry, Operation};
use crate::error::{EngineError, EngineResult, PersistenceError, TallyResult};
use crate::models::{AccountKind, AccountRef, EntryDraft, Ledger, Money, TransactionKind};
use crate::storage::file_io::write_bytes_atomic;
use crate::storage::Storage;

use super::account::{modify_in, open_in};
use super::ledger::{post, transfer};

/// Header row of a CSV batch file
pub const CSV_HEADER: &str = "operation_type,account,amount,to_account,memo,nickname,overdraft_limit";

const CSV_TEMPLATE_BODY: &str = "\
# Deposit 100.00 into the savings account
deposit,savings,100.00,,,,
# Withdraw 50.00 from the current account
withdraw,current,50.00,,,,
# Move 75.00 from savings to current with a memo
transfer,savings,75.00,current,Monthly transfer,,
# Open a salary account with 1000.00 and a nickname
create_account,salary,1000.00,,,My Salary,
# Rename the current account
update_nickname,current,,,,Everyday,
";

/// Batch file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchFormat {
    #[default]
    Csv,
    Json,
}

impl BatchFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Infer the format from a `.csv` or `.json` extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::parse)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// One operation of a batch, fully parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Deposit {
        account: String,
        amount: Money,
        memo: Option<String>,
    },
    Withdraw {
        account: String,
        amount: Money,
        memo: Option<String>,
    },
    Transfer {
        account: String,
        to_account: String,
        amount: Money,
        memo: Option<String>,
    },
    CreateAccount {
        kind: AccountKind,
        nickname: Option<String>,
        opening_balance: Money,
        overdraft_limit: Money,
    },
    UpdateNickname {
        account: String,
        nickname: String,
    },
}

impl BatchOperation {
    /// The `operation_type` name used in batch files
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::Transfer { .. } => "transfer",
            Self::CreateAccount { .. } => "create_account",
            Self::UpdateNickname { .. } => "update_nickname",
        }
    }
}

/// One entry of a batch file: the operation, or why it could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// File line for CSV, 1-based position for JSON
    pub line: u64,
    pub operation: Result<BatchOperation, String>,
}

/// Outcome of one batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Applied to the ledger
    Applied,
    /// Passed, but the batch was a preview or was rejected as a whole
    Valid,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub line: u64,
    /// Operation name, or `invalid` for entries that did not parse
    pub operation: &'static str,
    pub status: ItemStatus,
    pub message: String,
}

/// Per-operation tallies for the batch summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// What a batch run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub preview: bool,
    /// Whether the ledger now holds the batch's changes
    pub committed: bool,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == ItemStatus::Failed)
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.total() - self.failed()
    }

    pub fn by_operation(&self) -> BTreeMap<&'static str, OperationCounts> {
        let mut counts: BTreeMap<&'static str, OperationCounts> = BTreeMap::new();
        for outcome in &self.outcomes {
            let entry = counts.entry(outcome.operation).or_default();
            entry.total += 1;
            if outcome.status == ItemStatus::Failed {
                entry.failed += 1;
            } else {
                entry.succeeded += 1;
            }
        }
        counts
    }
}

/// Service for applying batch files
pub struct BatchService<'a> {
    storage: &'a Storage,
}

impl<'a> BatchService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Run a batch for one user, all or nothing.
    ///
    /// Items that failed to parse count as failures, so a batch with any
    /// malformed entry changes nothing. With `preview` the ledger is never
    /// changed and nothing is audited.
    pub fn run(
        &self,
        username: &str,
        items: &[BatchItem],
        preview: bool,
    ) -> EngineResult<BatchReport> {
        if items.is_empty() {
            return Err(EngineError::Validation(
                "batch contains no operations".into(),
            ));
        }

        let symbol = self.storage.settings().currency_symbol.as_str();
        let result = self.storage.write().and_then(|mut ledger| {
            ledger.user(username)?;

            let mut scratch = ledger.clone();
            let mut outcomes: Vec<ItemOutcome> = items
                .iter()
                .map(|item| execute(&mut scratch, username, item, symbol))
                .collect();

            let committed =
                !preview && outcomes.iter().all(|o| o.status != ItemStatus::Failed);
            if committed {
                *ledger = scratch;
                for outcome in &mut outcomes {
                    outcome.status = ItemStatus::Applied;
                }
            }

            Ok(BatchReport {
                preview,
                committed,
                outcomes,
            })
        });

        if let Ok(report) = &result {
            info!(
                user = username,
                operations = report.total(),
                failed = report.failed(),
                preview,
                committed = report.committed,
                "batch processed"
            );
        }
        if !preview {
            let entry = match &result {
                Ok(report) if report.committed => AuditEntry::applied(username, Operation::Batch)
                    .with_detail(format!("{} operations", report.total())),
                Ok(report) => AuditEntry::rejected(
                    username,
                    Operation::Batch,
                    &EngineError::Validation(format!(
                        "{} of {} operations failed; nothing applied",
                        report.failed(),
                        report.total()
                    )),
                ),
                Err(e) => AuditEntry::rejected(username, Operation::Batch, e),
            };
            self.storage.record(entry);
        }

        result
    }
}

/// Run one item against the scratch ledger. A failed item leaves it as it was.
fn execute(ledger: &mut Ledger, username: &str, item: &BatchItem, symbol: &str) -> ItemOutcome {
    let operation = match &item.operation {
        Ok(operation) => operation,
        Err(reason) => {
            return ItemOutcome {
                line: item.line,
                operation: "invalid",
                status: ItemStatus::Failed,
                message: reason.clone(),
            }
        }
    };

    let fmt = |m: Money| m.format_with_symbol(symbol);
    let result = match operation {
        BatchOperation::Deposit {
            account,
            amount,
            memo,
        } => {
            let draft = EntryDraft::new(TransactionKind::Deposit).with_memo(memo.clone());
            post(ledger, username, &AccountRef::parse(account), *amount, draft).map(
                |(_, balance)| {
                    format!(
                        "Deposited {} into {}; balance {}",
                        fmt(*amount),
                        account,
                        fmt(balance)
                    )
                },
            )
        }
        BatchOperation::Withdraw {
            account,
            amount,
            memo,
        } => {
            let draft = EntryDraft::new(TransactionKind::Withdrawal).with_memo(memo.clone());
            post(ledger, username, &AccountRef::parse(account), *amount, draft).map(
                |(_, balance)| {
                    format!(
                        "Withdrew {} from {}; balance {}",
                        fmt(*amount),
                        account,
                        fmt(balance)
                    )
                },
            )
        }
        BatchOperation::Transfer {
            account,
            to_account,
            amount,
            memo,
        } => transfer(
            ledger,
            username,
            &AccountRef::parse(account),
            &AccountRef::parse(to_account),
            *amount,
            memo.clone(),
        )
        .map(|receipt| {
            format!(
                "Transferred {} from {} to {} ({})",
                fmt(*amount),
                account,
                to_account,
                receipt.transfer_id
            )
        }),
        BatchOperation::CreateAccount {
            kind,
            nickname,
            opening_balance,
            overdraft_limit,
        } => open_in(
            ledger,
            username,
            *kind,
            nickname.clone(),
            *opening_balance,
            *overdraft_limit,
        )
        .map(|account| {
            format!(
                "Opened {} ({}) with balance {}",
                account.display_name(),
                account.id,
                fmt(account.balance())
            )
        }),
        BatchOperation::UpdateNickname { account, nickname } => modify_in(
            ledger,
            username,
            &AccountRef::parse(account),
            |others, target| {
                others.ensure_nickname_free(nickname, Some(target.id))?;
                target.set_nickname(Some(nickname.clone()))
            },
        )
        .map(|_| format!("Renamed {} to '{}'", account, nickname)),
    };

    let (status, message) = match result {
        Ok(message) => (ItemStatus::Valid, message),
        Err(e) => (ItemStatus::Failed, e.to_string()),
    };
    debug!(line = item.line, operation = operation.name(), ?status, "batch item checked");

    ItemOutcome {
        line: item.line,
        operation: operation.name(),
        status,
        message,
    }
}

/// Read and parse a batch file. The format comes from `format`, else from
/// the file extension.
pub fn read_batch_file(path: &Path, format: Option<BatchFormat>) -> TallyResult<Vec<BatchItem>> {
    let format = format.or_else(|| BatchFormat::from_path(path)).ok_or_else(|| {
        EngineError::Validation(format!(
            "cannot tell the format of {}; use a .csv or .json file or pass --format",
            path.display()
        ))
    })?;

    let content = fs::read_to_string(path).map_err(|e| {
        PersistenceError::Io(format!("Failed to read batch file {}: {}", path.display(), e))
    })?;

    let items = match format {
        BatchFormat::Csv => parse_csv(content.as_bytes())?,
        BatchFormat::Json => parse_json(&content)?,
    };
    Ok(items)
}

/// Parse CSV batch rows. Rows without an `operation_type` are skipped.
pub fn parse_csv<R: Read>(reader: R) -> EngineResult<Vec<BatchItem>> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| EngineError::Validation(format!("unreadable batch header: {}", e)))?
        .clone();
    if !headers.iter().any(|h| h == "operation_type") {
        return Err(EngineError::Validation(format!(
            "batch header must be: {}",
            CSV_HEADER
        )));
    }

    let mut items = Vec::new();
    for record in reader.records() {
        let item = match record {
            Ok(record) => {
                let line = record.position().map_or(0, |p| p.line());
                match record.deserialize::<CsvRow>(Some(&headers)) {
                    Ok(row) if row.operation_type.is_none() => continue,
                    Ok(row) => BatchItem {
                        line,
                        operation: row.into_operation(),
                    },
                    Err(e) => BatchItem {
                        line,
                        operation: Err(format!("malformed row: {}", e)),
                    },
                }
            }
            Err(e) => BatchItem {
                line: e.position().map_or(0, |p| p.line()),
                operation: Err(format!("malformed row: {}", e)),
            },
        };
        items.push(item);
    }

    Ok(items)
}

/// Parse a JSON batch document
pub fn parse_json(text: &str) -> EngineResult<Vec<BatchItem>> {
    let batch: JsonBatch = serde_json::from_str(text)
        .map_err(|e| EngineError::Validation(format!("invalid batch JSON: {}", e)))?;

    let items = batch
        .operations
        .into_iter()
        .zip(1u64..)
        .map(|(value, line)| {
            let operation = serde_json::from_value::<JsonOperation>(value)
                .map_err(|e| format!("malformed operation: {}", e))
                .and_then(|op| build(&op.operation_type, op.parameters));
            BatchItem { line, operation }
        })
        .collect();

    Ok(items)
}

/// Write an example batch file covering every operation type
pub fn write_template(path: &Path, format: BatchFormat) -> TallyResult<()> {
    if path.exists() {
        return Err(EngineError::Validation(format!(
            "{} already exists; choose another path",
            path.display()
        ))
        .into());
    }

    let bytes = match format {
        BatchFormat::Csv => format!("{}\n{}", CSV_HEADER, CSV_TEMPLATE_BODY).into_bytes(),
        BatchFormat::Json => {
            let template = serde_json::json!({
                "operations": [
                    {"operation_type": "deposit",
                     "parameters": {"account": "savings", "amount": "100.00"}},
                    {"operation_type": "withdraw",
                     "parameters": {"account": "current", "amount": "50.00"}},
                    {"operation_type": "transfer",
                     "parameters": {"account": "savings", "to_account": "current",
                                    "amount": "75.00", "memo": "Monthly transfer"}},
                    {"operation_type": "create_account",
                     "parameters": {"account": "salary", "amount": "1000.00",
                                    "nickname": "My Salary"}},
                    {"operation_type": "update_nickname",
                     "parameters": {"account": "current", "nickname": "Everyday"}}
                ]
            });
            serde_json::to_vec_pretty(&template).map_err(PersistenceError::from)?
        }
    };

    write_bytes_atomic(path, &bytes)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct JsonBatch {
    operations: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct JsonOperation {
    #[serde(default)]
    operation_type: String,
    #[serde(default)]
    parameters: RawFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvRow {
    operation_type: Option<String>,
    account: Option<String>,
    amount: Option<String>,
    to_account: Option<String>,
    memo: Option<String>,
    nickname: Option<String>,
    overdraft_limit: Option<String>,
}

impl CsvRow {
    fn into_operation(self) -> Result<BatchOperation, String> {
        let operation_type = self.operation_type.unwrap_or_default();
        build(
            &operation_type,
            RawFields {
                account: self.account,
                amount: self.amount.map(RawAmount::Text),
                to_account: self.to_account,
                memo: self.memo,
                nickname: self.nickname,
                overdraft_limit: self.overdraft_limit.map(RawAmount::Text),
            },
        )
    }
}

/// Operation parameters as found in either format
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFields {
    account: Option<String>,
    amount: Option<RawAmount>,
    to_account: Option<String>,
    memo: Option<String>,
    nickname: Option<String>,
    overdraft_limit: Option<RawAmount>,
}

/// JSON amounts may be strings (`"12.50"`) or numbers (`12.5`)
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Number(serde_json::Number),
}

impl RawAmount {
    fn to_money(&self, field: &str) -> Result<Money, String> {
        let text = match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
        };
        Money::parse(&text).map_err(|e| format!("invalid {}: {}", field, e))
    }
}

fn build(operation_type: &str, fields: RawFields) -> Result<BatchOperation, String> {
    let operation_type = operation_type.trim().to_ascii_lowercase();
    let op = operation_type.as_str();

    match op {
        "deposit" | "withdraw" | "withdrawal" => {
            let account = required(fields.account, op, "account")?;
            let amount = required_amount(fields.amount.as_ref(), op)?;
            let memo = optional(fields.memo);
            Ok(if op == "deposit" {
                BatchOperation::Deposit {
                    account,
                    amount,
                    memo,
                }
            } else {
                BatchOperation::Withdraw {
                    account,
                    amount,
                    memo,
                }
            })
        }
        "transfer" => Ok(BatchOperation::Transfer {
            account: required(fields.account, op, "account")?,
            to_account: required(fields.to_account, op, "to_account")?,
            amount: required_amount(fields.amount.as_ref(), op)?,
            memo: optional(fields.memo),
        }),
        "create_account" | "open_account" => {
            let kind_name = required(fields.account, op, "account")?;
            let kind = AccountKind::parse(&kind_name)
                .ok_or_else(|| format!("unknown account type '{}'", kind_name))?;
            Ok(BatchOperation::CreateAccount {
                kind,
                nickname: optional(fields.nickname),
                opening_balance: optional_amount(fields.amount.as_ref(), "amount")?,
                overdraft_limit: optional_amount(
                    fields.overdraft_limit.as_ref(),
                    "overdraft_limit",
                )?,
            })
        }
        "update_nickname" | "set_nickname" => Ok(BatchOperation::UpdateNickname {
            account: required(fields.account, op, "account")?,
            nickname: required(fields.nickname, op, "nickname")?,
        }),
        "" => Err("missing operation_type".to_string()),
        other => Err(format!("unsupported operation type '{}'", other)),
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, op: &str, field: &str) -> Result<String, String> {
    optional(value).ok_or_else(|| format!("{} requires '{}'", op, field))
}

fn required_amount(value: Option<&RawAmount>, op: &str) -> Result<Money, String> {
    value
        .ok_or_else(|| format!("{} requires 'amount'", op))?
        .to_money("amount")
}

fn optional_amount(value: Option<&RawAmount>, field: &str) -> Result<Money, String> {
    value.map_or(Ok(Money::zero()), |v| v.to_money(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Outcome;
    use crate::config::{Settings, TallyPaths};
    use crate::models::{Account, User};
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let paths = TallyPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::new(paths, Settings::default()).unwrap();

        {
            let mut ledger = storage.write().unwrap();
            let mut user = User::new("alice", "hash", "alice@example.com").unwrap();
            user.add_account(
                Account::open(
                    AccountKind::Savings,
                    None,
                    Money::from_cents(20000),
                    Money::zero(),
                )
                .unwrap(),
            )
            .unwrap();
            user.add_account(
                Account::open(
                    AccountKind::Current,
                    None,
                    Money::from_cents(10000),
                    Money::zero(),
                )
                .unwrap(),
            )
            .unwrap();
            ledger.add_user(user).unwrap();
        }

        (temp_dir, storage)
    }

    fn balance(storage: &Storage, account: &str) -> Money {
        storage
            .read()
            .unwrap()
            .user("alice")
            .unwrap()
            .account(&account.into())
            .unwrap()
            .balance()
    }

    fn csv(rows: &str) -> Vec<BatchItem> {
        parse_csv(format!("{}\n{}", CSV_HEADER, rows).as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_csv_rows() {
        let items = csv("deposit,savings,100.00,,payday,,\n\
                         transfer, savings ,75,current,,,\n\
                         create_account,salary,,,,Pay,\n\
                         ,,,,,,\n\
                         update_nickname,current,,,,Everyday,\n");

        assert_eq!(items.len(), 4);
        assert_eq!(items[0].line, 2);
        assert_eq!(
            items[0].operation,
            Ok(BatchOperation::Deposit {
                account: "savings".into(),
                amount: Money::from_cents(10000),
                memo: Some("payday".into()),
            })
        );
        assert_eq!(
            items[1].operation,
            Ok(BatchOperation::Transfer {
                account: "savings".into(),
                to_account: "current".into(),
                amount: Money::from_cents(7500),
                memo: None,
            })
        );
        assert_eq!(
            items[2].operation,
            Ok(BatchOperation::CreateAccount {
                kind: AccountKind::Salary,
                nickname: Some("Pay".into()),
                opening_balance: Money::zero(),
                overdraft_limit: Money::zero(),
            })
        );
        assert_eq!(items[3].line, 6);
    }

    #[test]
    fn test_parse_csv_reports_bad_rows() {
        let items = csv("deposit,savings,ten,,,,\n\
                         transfer,savings,5,,,,\n\
                         teleport,savings,5,,,,\n\
                         create_account,checking-plus,,,,,\n");

        let errors: Vec<String> = items
            .into_iter()
            .map(|i| i.operation.unwrap_err())
            .collect();
        assert!(errors[0].contains("invalid amount"));
        assert_eq!(errors[1], "transfer requires 'to_account'");
        assert_eq!(errors[2], "unsupported operation type 'teleport'");
        assert!(errors[3].contains("unknown account type"));
    }

    #[test]
    fn test_parse_csv_requires_header() {
        assert!(matches!(
            parse_csv("deposit,savings,1\n".as_bytes()),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_json_accepts_string_and_number_amounts() {
        let items = parse_json(
            r#"{"operations": [
                {"operation_type": "Deposit", "parameters": {"account": "savings", "amount": 12.5}},
                {"operation_type": "withdraw", "parameters": {"account": "current", "amount": "3.25"}},
                {"operation_type": "update_nickname", "parameters": {"account": "current"}},
                "not an object"
            ]}"#,
        )
        .unwrap();

        assert_eq!(items.len(), 4);
        assert_eq!(
            items[0].operation,
            Ok(BatchOperation::Deposit {
                account: "savings".into(),
                amount: Money::from_cents(1250),
                memo: None,
            })
        );
        assert_eq!(items[1].line, 2);
        assert!(matches!(
            items[1].operation,
            Ok(BatchOperation::Withdraw { amount, .. }) if amount == Money::from_cents(325)
        ));
        assert_eq!(
            items[2].operation,
            Err("update_nickname requires 'nickname'".to_string())
        );
        assert!(items[3].operation.as_ref().unwrap_err().contains("malformed"));

        assert!(matches!(
            parse_json("{\"ops\": []}"),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_run_applies_every_operation() {
        let (_temp, storage) = create_test_storage();
        let items = csv("deposit,savings,100.00,,,,\n\
                         withdraw,current,50.00,,,,\n\
                         transfer,savings,75.00,current,Monthly,,\n\
                         create_account,salary,1000.00,,,Pay,\n\
                         update_nickname,current,,,,Everyday,\n");

        let report = BatchService::new(&storage)
            .run("alice", &items, false)
            .unwrap();

        assert!(report.committed);
        assert_eq!(report.succeeded(), 5);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.status == ItemStatus::Applied));
        assert_eq!(balance(&storage, "savings"), Money::from_cents(22500));
        assert_eq!(balance(&storage, "everyday"), Money::from_cents(12500));
        assert_eq!(balance(&storage, "pay"), Money::from_cents(100000));
        assert!(storage.read().unwrap().invariants_hold());

        let audit = storage.audit_log().read_all().unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].operation, Operation::Batch);
        assert_eq!(audit[0].outcome, Outcome::Applied);
    }

    #[test]
    fn test_run_is_all_or_nothing() {
        let (_temp, storage) = create_test_storage();
        let before = storage.read().unwrap().clone();
        let items = csv("deposit,savings,100.00,,,,\n\
                         withdraw,current,500.00,,,,\n\
                         transfer,savings,10,current,,,\n");

        let report = BatchService::new(&storage)
            .run("alice", &items, false)
            .unwrap();

        assert!(!report.committed);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.outcomes[0].status, ItemStatus::Valid);
        assert_eq!(report.outcomes[1].status, ItemStatus::Failed);
        assert!(report.outcomes[1].message.contains("Insufficient funds"));
        assert_eq!(report.outcomes[2].status, ItemStatus::Valid);
        assert_eq!(*storage.read().unwrap(), before);

        let audit = storage.audit_log().read_all().unwrap();
        assert_eq!(audit[0].outcome, Outcome::Rejected);
    }

    #[test]
    fn test_later_operations_see_earlier_ones() {
        let (_temp, storage) = create_test_storage();
        // Only affordable after the deposit lands
        let items = csv("deposit,current,500.00,,,,\n\
                         withdraw,current,550.00,,,,\n");

        let report = BatchService::new(&storage)
            .run("alice", &items, false)
            .unwrap();

        assert!(report.committed);
        assert_eq!(balance(&storage, "current"), Money::from_cents(5000));
    }

    #[test]
    fn test_malformed_item_blocks_batch() {
        let (_temp, storage) = create_test_storage();
        let items = csv("deposit,savings,100.00,,,,\n\
                         deposit,savings,1.234,,,,\n");

        let report = BatchService::new(&storage)
            .run("alice", &items, false)
            .unwrap();

        assert!(!report.committed);
        assert_eq!(report.outcomes[1].operation, "invalid");
        assert_eq!(balance(&storage, "savings"), Money::from_cents(20000));
    }

    #[test]
    fn test_preview_changes_nothing() {
        let (_temp, storage) = create_test_storage();
        let items = csv("deposit,savings,100.00,,,,\n\
                         create_account,salary,5,,,,\n");

        let report = BatchService::new(&storage)
            .run("alice", &items, true)
            .unwrap();

        assert!(report.preview);
        assert!(!report.committed);
        assert_eq!(report.succeeded(), 2);
        assert!(report.outcomes.iter().all(|o| o.status == ItemStatus::Valid));
        assert_eq!(balance(&storage, "savings"), Money::from_cents(20000));
        assert_eq!(storage.read().unwrap().user("alice").unwrap().accounts().len(), 2);
        assert!(storage.audit_log().read_all().unwrap().is_empty());
    }

    #[test]
    fn test_run_rejects_empty_batch_and_unknown_user() {
        let (_temp, storage) = create_test_storage();
        let service = BatchService::new(&storage);

        assert!(matches!(
            service.run("alice", &[], false),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            service.run("bob", &csv("deposit,savings,1,,,,\n"), false),
            Err(EngineError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_by_operation_counts() {
        let (_temp, storage) = create_test_storage();
        let items = csv("deposit,savings,1,,,,\n\
                         deposit,nowhere,1,,,,\n\
                         withdraw,savings,1,,,,\n");

        let report = BatchService::new(&storage)
            .run("alice", &items, true)
            .unwrap();
        let counts = report.by_operation();

        assert_eq!(
            counts["deposit"],
            OperationCounts {
                total: 2,
                succeeded: 1,
                failed: 1
            }
        );
        assert_eq!(counts["withdraw"].succeeded, 1);
    }

    #[test]
    fn test_templates_parse_and_apply() {
        let (temp, storage) = create_test_storage();

        for format in [BatchFormat::Csv, BatchFormat::Json] {
            let path = temp.path().join(format!("template.{}", format.as_str()));
            write_template(&path, format).unwrap();
            assert!(write_template(&path, format).is_err());

            let items = read_batch_file(&path, None).unwrap();
            assert_eq!(items.len(), 5);
            assert!(items.iter().all(|i| i.operation.is_ok()));

            let report = BatchService::new(&storage)
                .run("alice", &items, true)
                .unwrap();
            assert_eq!(report.failed(), 0, "{:?}", report.outcomes);
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            BatchFormat::from_path(Path::new("ops.JSON")),
            Some(BatchFormat::Json)
        );
        assert_eq!(BatchFormat::from_path(Path::new("ops.txt")), None);
        assert!(read_batch_file(Path::new("ops.txt"), None).is_err());
    }
}
