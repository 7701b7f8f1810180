mod annotate;
mod resolver;

pub use self::annotate::{AnnotationSummary, MatchResult, MatchedBy, annotate, summarize};
pub use self::resolver::{
    CaseKey, CollisionPolicy, IdentifierCollision, IdentifierLookup, LookupEntry, ResolveOptions,
    resolve, resolve_with,
};
