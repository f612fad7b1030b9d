pub mod email_digests;
pub mod email_events;
pub mod email_preferences;
pub mod insights;
pub mod profiles;
pub mod stacks;
pub mod suppression_entries;
pub mod unsubscribe_tokens;

pub mod prelude {
    pub use super::email_digests::Entity as EmailDigests;
    pub use super::email_events::Entity as EmailEvents;
    pub use super::email_preferences::Entity as EmailPreferences;
    pub use super::insights::Entity as Insights;
    pub use super::profiles::Entity as Profiles;
    pub use super::stacks::Entity as Stacks;
    pub use super::suppression_entries::Entity as SuppressionEntries;
    pub use super::unsubscribe_tokens::Entity as UnsubscribeTokens;
}
