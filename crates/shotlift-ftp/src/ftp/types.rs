// ─── Replies ─────────────────────────────────────────────────────────

/// Meaning of the first digit of a reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 1xx: action started, expect another reply.
    Preliminary,
    /// 2xx
    Completion,
    /// 3xx: more input needed (e.g. PASS after USER).
    Intermediate,
    /// 4xx
    TransientFailure,
    /// 5xx
    PermanentFailure,
}

/// A server reply; multi-line replies keep every line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpReply {
    pub fn class(&self) -> ReplyClass {
        match self.code / 100 {
            1 => ReplyClass::Preliminary,
            2 => ReplyClass::Completion,
            3 => ReplyClass::Intermediate,
            4 => ReplyClass::TransientFailure,
            _ => ReplyClass::PermanentFailure,
        }
    }

    pub fn is_completion(&self) -> bool {
        self.class() == ReplyClass::Completion
    }

    pub fn is_preliminary(&self) -> bool {
        self.class() == ReplyClass::Preliminary
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

// ─── Listing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpEntryKind {
    File,
    Directory,
    Symlink,
    Unknown,
}

/// A directory entry from LIST or MLSD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpEntry {
    pub name: String,
    pub kind: FtpEntryKind,
}

// ─── FEAT ────────────────────────────────────────────────────────────

/// Extensions from the FEAT reply that the client acts on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerFeatures {
    pub epsv: bool,
    pub utf8: bool,
    pub mlsd: bool,
}
