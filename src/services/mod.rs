pub mod attachments;
pub mod charge_status;
pub mod invitations;
pub mod storage;
