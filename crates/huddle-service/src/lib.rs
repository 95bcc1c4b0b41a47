//! # huddle-service
//!
//! Application layer: the use cases behind both the REST API and the
//! gateway. Services check membership and admin rules, persist through the
//! repository traits, and publish the resulting events to Redis pub/sub so
//! every gateway instance can fan them out.

pub mod dto;
pub mod services;

pub use services::{
    AuthService, ConversationService, EventPublisher, MembershipChange, MessageService,
    NotificationService, PresenceService, ReactionService, SendOutcome, ServiceContext,
    ServiceContextBuilder, ServiceError, ServiceResult, UserService,
};
