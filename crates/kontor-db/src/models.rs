/// Database row types, mapped directly from SQLite rows.
/// Distinct from kontor-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub subscription_status: String,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

pub struct ProfileRow {
    pub id: String,
    pub user_id: String,
    pub company_name: String,
    pub vat_id: String,
    pub address: String,
    pub country: String,
}

pub struct ThreadRow {
    pub id: String,
    pub user_id: String,
    pub module: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub thread_id: String,
    pub role: String,
    pub content: String,
    pub metadata: Option<String>,
    pub created_at: String,
}

pub struct StripeAccountRow {
    pub id: String,
    pub user_id: String,
    pub api_key: String,
    pub is_connected: bool,
}

pub struct ElsterAccountRow {
    pub id: String,
    pub user_id: String,
    pub tax_id: String,
    pub is_connected: bool,
    pub frequency: String,
    pub full_name: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub bank_name: Option<String>,
    pub iban: Option<String>,
}

pub struct TransactionRow {
    pub id: String,
    pub user_id: String,
    pub stripe_id: Option<String>,
    pub date: String,
    pub description: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub tax_amount: Option<f64>,
    pub is_expense_claimed: bool,
}

pub struct SubmissionRow {
    pub id: String,
    pub user_id: String,
    pub timestamp: String,
    pub period: String,
    pub status: String,
}

pub struct ChannelRow {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub url: String,
    pub api_credentials: Option<String>,
}

pub struct TopicRow {
    pub id: String,
    pub user_id: String,
    pub topic: String,
}

pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub channel_id: Option<String>,
    pub topic_id: Option<String>,
    pub content: String,
    pub status: String,
    pub scheduled_at: Option<String>,
}
