use redb::TableDefinition;

/// Primary record table: id -> entity (MessagePack)
pub type RecordTable = TableDefinition<'static, u64, &'static [u8]>;

/// Unique index: normalized field value -> id
pub type UniqueIndex = TableDefinition<'static, &'static str, u64>;

/// Books: book_id -> Book
pub const BOOKS: RecordTable = TableDefinition::new("books");

/// Members: member_id -> Member
pub const MEMBERS: RecordTable = TableDefinition::new("members");

/// Accounts: account_id -> Account
pub const ACCOUNTS: RecordTable = TableDefinition::new("accounts");

/// Ledger: transaction_id -> Transaction
pub const TRANSACTIONS: RecordTable = TableDefinition::new("transactions");

/// Unique index: isbn -> book_id
pub const BOOK_ISBNS: UniqueIndex = TableDefinition::new("book_isbns");

/// Unique index: lowercase email -> member_id
pub const MEMBER_EMAILS: UniqueIndex = TableDefinition::new("member_emails");

/// Unique index: username -> account_id
pub const ACCOUNT_USERNAMES: UniqueIndex = TableDefinition::new("account_usernames");

/// Unique index: lowercase email -> account_id
pub const ACCOUNT_EMAILS: UniqueIndex = TableDefinition::new("account_emails");

/// Open loans: (book_id, member_id) -> borrow transaction_id
pub const OPEN_LOANS: TableDefinition<(u64, u64), u64> = TableDefinition::new("open_loans");

/// Id sequences: entity name -> last issued id
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
