//! Route paths.

pub const POST_AUTH_TELEGRAM: &str = "/api/auth/telegram";
pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const GET_AUTH_ME: &str = "/api/auth/me";
pub const POST_WEBAPP_VERIFY: &str = "/api/webapp/verify";
pub const GET_ADMIN_CONTACTS_ADMINS: &str = "/api/admin/contacts/admins";
pub const PUT_ADMIN_CONTACTS_ID_ADMIN: &str = "/api/admin/contacts/{id}/admin";
pub const GET_HEALTH: &str = "/api/health";
