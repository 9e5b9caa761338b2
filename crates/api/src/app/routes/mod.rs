pub mod checkout;
pub mod cron;
pub mod payouts;
pub mod system;
pub mod tasks;
