//! Data transfer objects for API requests, responses and event payloads

pub mod mappers;
pub mod requests;
pub mod responses;

pub use requests::{
    CreateConversationRequest, EditMessageRequest, ListConversationsQuery, LoginRequest,
    LogoutRequest, MessageHistoryQuery, NewConversation, NotificationQuery, ParticipantRequest,
    RefreshTokenRequest, RegisterRequest, SendMessageRequest, UpdateConversationRequest,
    UpdateStatusRequest, UpdateUserRequest, UserSearchQuery,
};

pub use responses::{
    AuthResponse, ConversationDeletedPayload, ConversationResponse,
    CreatedConversation, CurrentUserResponse, HealthChecks, HealthResponse, LastMessageResponse,
    MarkAllReadResponse, MemberAddedPayload, MemberRemovedPayload, MessageDeletedPayload,
    MessagePage, MessagePinnedPayload, MessageResponse, MessageSentPayload,
    NotificationListResponse, NotificationResponse, ParticipantResponse, PresenceResponse,
    ReactionResponse, ReactionUpdatedPayload, ReadinessResponse, TypingPayload, UserResponse,
    UserWithPresenceResponse,
};

pub use mappers::{reaction_list, ConversationView};
