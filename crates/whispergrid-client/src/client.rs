//! The protocol engine.
//!
//! [`Client`] drives the whole conversation lifecycle over a [`Storage`]
//! backend: invitation creation, handshake completion, thread replies,
//! ingestion of inbound tokens, decrypted views and backups. Every
//! operation is a synchronous, deterministic computation; the only
//! side effects are storage writes and queued [`ClientEvent`]s.
//!
//! # Trust model
//!
//! Signature verification always uses a key the client already holds (its
//! own, or the peer key recorded at handshake). A key embedded in a token
//! header only *routes* to the right recorded key; it is never itself the
//! verification authority once a thread exists.
//!
//! # Ingestion
//!
//! The ordering engine is the sole gatekeeper for the message log: a token
//! is persisted iff its id is admitted. Re-delivery of an admitted message
//! is a no-op [`Appended::Duplicate`], which makes ingestion idempotent.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use whispergrid_core::{
    Identity, IdentityError, Storage, StorageError, StorageKey, StoredIdentity, ThreadId,
    ThreadInfo, ThreadOrdering,
};
use whispergrid_crypto::{SharedSecret, Thumbprint, decrypt_payload, encrypt_payload};
use whispergrid_proto::{
    Body, InvitationPayload, MessageId, MessagePayload, ReplyPayload, SignedToken, Subject,
    TokenError, TokenHeader,
};

use crate::{decrypted::DecryptedMessage, error::ClientError, event::ClientEvent};

/// Options for composing an outbound reply.
#[derive(Debug, Clone, Default)]
pub struct ReplyOptions {
    /// Embed the signer's public key in the token header. Off by default
    /// for plain replies: the peer already holds our key, and omitting it
    /// keeps the envelope free of identifying material.
    pub self_sign: bool,

    /// Announce a relay URL in this message ("push my messages here").
    pub set_my_relay: Option<String>,
}

/// A composed outbound message, ready for delivery.
#[derive(Debug, Clone)]
pub struct Outgoing {
    /// The signed wire token.
    pub token: SignedToken,

    /// The thread it belongs to.
    pub thread_id: ThreadId,

    /// The peer's announced relay, when one is known. The caller decides
    /// whether and how to deliver; the engine never performs IO.
    pub peer_relay: Option<String>,
}

/// Outcome of ingesting a token into a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Appended {
    /// The message was admitted and persisted.
    Added {
        /// The thread it landed in.
        thread_id: ThreadId,
        /// Its author-sequence id.
        message_id: MessageId,
    },

    /// The message was already present; nothing changed.
    Duplicate {
        /// The thread it would have landed in.
        thread_id: ThreadId,
        /// Its author-sequence id.
        message_id: MessageId,
    },
}

impl Appended {
    /// The thread the token resolved to.
    pub fn thread_id(&self) -> &ThreadId {
        match self {
            Appended::Added { thread_id, .. } | Appended::Duplicate { thread_id, .. } => thread_id,
        }
    }

    /// Whether ingestion was a no-op.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Appended::Duplicate { .. })
    }
}

/// Serialized form of a full-state backup (the `grid-backup` payload).
///
/// Private material stays protected inside: identity keys are
/// password-wrapped and thread keys remain self-encrypted tokens, so the
/// backup itself can travel in the clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupPayload {
    identity: StoredIdentity,
    /// Thread-key thumbprint to invitation token.
    invitations: BTreeMap<String, String>,
    /// Thread-key thumbprint to self-encrypted key token.
    thread_keys: BTreeMap<String, String>,
    /// Thread id to thread record.
    threads: BTreeMap<String, ThreadInfo>,
    /// Thread id to message log.
    messages: BTreeMap<String, Vec<String>>,
}

/// A grid node: one identity driving threads over a storage backend.
#[derive(Debug)]
pub struct Client<S: Storage> {
    storage: S,
    identity: Identity,
    thumbprint: Thumbprint,
    events: VecDeque<ClientEvent>,
}

impl<S: Storage> Client<S> {
    /// Create a fresh identity and persist its record.
    pub fn generate(storage: S, password: &str) -> Result<Client<S>, ClientError> {
        let (identity, record) = Identity::generate(password)?;
        let thumbprint = record.thumbprint.clone();
        storage.set(
            &StorageKey::Identity(thumbprint.clone()),
            serde_json::to_string(&record).map_err(StorageError::from)?,
        )?;
        Ok(Client { storage, identity, thumbprint, events: VecDeque::new() })
    }

    /// Unlock a previously stored identity.
    pub fn load(storage: S, thumbprint: &Thumbprint, password: &str) -> Result<Client<S>, ClientError> {
        let text = storage
            .get(&StorageKey::Identity(thumbprint.clone()))?
            .ok_or_else(|| ClientError::IdentityNotFound(thumbprint.clone()))?;
        let record: StoredIdentity = serde_json::from_str(&text).map_err(StorageError::from)?;
        let identity = Identity::load(&record, password)?;
        Ok(Client { storage, identity, thumbprint: thumbprint.clone(), events: VecDeque::new() })
    }

    /// This identity's thumbprint.
    pub fn thumbprint(&self) -> &Thumbprint {
        &self.thumbprint
    }

    /// The backing store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Drain all events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        self.events.drain(..).collect()
    }

    /// Thread ids this identity participates in.
    pub fn threads(&self) -> Result<Vec<ThreadId>, ClientError> {
        self.storage
            .get_list(&StorageKey::Threads(self.thumbprint.clone()))?
            .iter()
            .map(|text| Ok(ThreadId::parse(text)?))
            .collect()
    }

    /// Thumbprints of invitations this identity has issued.
    pub fn invitations(&self) -> Result<Vec<Thumbprint>, ClientError> {
        self.storage
            .get_list(&StorageKey::Invitations(self.thumbprint.clone()))?
            .iter()
            .map(|text| Ok(Thumbprint::parse(text)?))
            .collect()
    }

    /// Create a publicly shareable invitation.
    ///
    /// Generates a dedicated thread key, stores its private half
    /// self-encrypted, and signs a plaintext `grid-invitation` token
    /// carrying the public half, a random opening message id, the
    /// nickname and an optional note.
    pub fn create_invitation(
        &mut self,
        nickname: &str,
        note: Option<&str>,
    ) -> Result<SignedToken, ClientError> {
        let (thread_key, pair) = self.identity.make_thread_key(&self.storage)?;
        let payload = InvitationPayload {
            message_id: MessageId::random(),
            epk: pair.public_jwk()?,
            note: note.map(str::to_string),
            nickname: nickname.to_string(),
        };

        let header =
            TokenHeader::new(Subject::Invitation).with_jwk(self.identity.signing_public_jwk()?);
        let token = SignedToken::sign(header, &Body::from_value(&payload)?, self.identity.signing())?;

        self.storage
            .set(&StorageKey::Invitation(thread_key.clone()), token.as_str().to_string())?;
        self.storage.append(
            &StorageKey::Invitations(self.thumbprint.clone()),
            thread_key.to_string(),
            true,
        )?;

        debug!(invitation = %thread_key, "created invitation");
        self.events.push_back(ClientEvent::InvitationCreated { thumbprint: thread_key });
        Ok(token)
    }

    /// Answer someone else's invitation, creating the thread locally and
    /// composing the `reply-to-invite` handshake token.
    pub fn reply_to_invitation(
        &mut self,
        invitation_text: &str,
        message: &str,
        opts: &ReplyOptions,
    ) -> Result<Outgoing, ClientError> {
        let invitation = SignedToken::parse(invitation_text)?;
        if invitation.header().sub != Subject::Invitation {
            return Err(ClientError::UnexpectedToken(invitation.header().sub));
        }
        // First contact: the embedded key is all we have (trust on first
        // use); it becomes the recorded peer key for the thread's lifetime.
        invitation.verify(None)?;
        let peer_signing =
            invitation.header().jwk.clone().ok_or(ClientError::MissingField("jwk"))?;
        let invite: InvitationPayload = invitation.body().parse_as()?;
        let invite_key = invite.epk.thumbprint();

        let (my_thread_key, pair) = self.identity.make_thread_key(&self.storage)?;
        let thread_id = ThreadId::derive(&my_thread_key, &invite_key);
        let secret = pair.derive_shared_secret(&invite.epk)?;

        let mut info = ThreadInfo {
            invitation: invitation.as_str().to_string(),
            my_thread_key,
            peer_epk: invite.epk.clone(),
            peer_signing_key: peer_signing,
            ordering: ThreadOrdering::new(),
            relays: BTreeMap::new(),
        };
        // The invitation's id opens the peer's sequence.
        info.ordering.accept(invite.message_id)?;

        let message_id = MessageId::random();
        info.ordering.record_syn(message_id)?;
        let payload = ReplyPayload {
            message_id,
            message: message.to_string(),
            min_ack: info.ordering.min_ack,
            relay: opts.set_my_relay.clone(),
        };
        if let Some(url) = &opts.set_my_relay {
            info.relays.insert(self.thumbprint.to_string(), url.clone());
        }

        let encrypted = encrypt_payload(
            &secret,
            &serde_json::to_string(&payload).map_err(TokenError::from)?,
        )?;
        let header = TokenHeader::new(Subject::ReplyToInvite)
            .with_jwk(self.identity.signing_public_jwk()?)
            .with_epk(pair.public_jwk()?)
            .with_invite(invite_key)
            .with_iv(encrypted.iv);
        let token =
            SignedToken::sign(header, &Body::Text(encrypted.ciphertext), self.identity.signing())?;

        self.save_thread(&thread_id, &info)?;
        self.storage.append(
            &StorageKey::Threads(self.thumbprint.clone()),
            thread_id.to_string(),
            true,
        )?;
        self.storage.append(
            &StorageKey::KeyedMessages(self.thumbprint.clone(), thread_id.clone()),
            token.as_str().to_string(),
            true,
        )?;

        debug!(thread = %thread_id, "answered invitation");
        self.events.push_back(ClientEvent::ThreadCreated { thread_id: thread_id.clone() });
        self.events
            .push_back(ClientEvent::MessageAppended { thread_id: thread_id.clone(), message_id });
        Ok(Outgoing { token, thread_id, peer_relay: None })
    }

    /// Compose an encrypted reply within an established thread.
    ///
    /// The message id continues this party's send sequence (or opens it
    /// with a random id); the current contiguous-received bound rides
    /// along as `minAck`.
    pub fn reply_to_thread(
        &mut self,
        thread_id: &ThreadId,
        message: &str,
        opts: &ReplyOptions,
    ) -> Result<Outgoing, ClientError> {
        let mut info = self.thread_info(thread_id)?;
        let secret = self.thread_secret(&info)?;

        let message_id = info.ordering.next_syn().unwrap_or_else(MessageId::random);
        info.ordering.record_syn(message_id)?;
        let payload = ReplyPayload {
            message_id,
            message: message.to_string(),
            min_ack: info.ordering.min_ack,
            relay: opts.set_my_relay.clone(),
        };
        if let Some(url) = &opts.set_my_relay {
            info.relays.insert(self.thumbprint.to_string(), url.clone());
        }

        let encrypted = encrypt_payload(
            &secret,
            &serde_json::to_string(&payload).map_err(TokenError::from)?,
        )?;
        let mut header = TokenHeader::new(Subject::Reply).with_iv(encrypted.iv);
        if opts.self_sign {
            header = header.with_jwk(self.identity.signing_public_jwk()?);
        }
        let token =
            SignedToken::sign(header, &Body::Text(encrypted.ciphertext), self.identity.signing())?;

        self.storage.append(
            &StorageKey::KeyedMessages(self.thumbprint.clone(), thread_id.clone()),
            token.as_str().to_string(),
            true,
        )?;
        let peer_relay = info.relay_for(&info.peer_signing_key.thumbprint()).map(str::to_string);
        self.save_thread(thread_id, &info)?;

        self.events
            .push_back(ClientEvent::MessageAppended { thread_id: thread_id.clone(), message_id });
        Ok(Outgoing { token, thread_id: thread_id.clone(), peer_relay })
    }

    /// Ingest an inbound token.
    ///
    /// Routing is by subject: a `reply-to-invite` locates (or creates) its
    /// thread from the answered invitation, a `grid-reply` can only be
    /// appended to the known thread named by `thread`, and every other
    /// subject is rejected.
    pub fn append_thread(
        &mut self,
        token_text: &str,
        thread: Option<&ThreadId>,
    ) -> Result<Appended, ClientError> {
        let token = SignedToken::parse(token_text)?;
        match token.header().sub {
            Subject::ReplyToInvite => self.ingest_reply_to_invite(&token),
            Subject::Reply => {
                let thread_id = thread.ok_or(ClientError::MissingField("thread id"))?;
                self.ingest_reply(thread_id, &token)
            }
            sub => Err(ClientError::UnexpectedToken(sub)),
        }
    }

    /// Decrypt one stored or inbound token into a readable view.
    pub fn decrypt_message(
        &self,
        thread_id: &ThreadId,
        token_text: &str,
    ) -> Result<DecryptedMessage, ClientError> {
        let token = SignedToken::parse(token_text)?;
        let info = self.thread_info(thread_id)?;
        match token.header().sub {
            Subject::Invitation => {
                token.verify(None)?;
                let jwk = token.header().jwk.as_ref().ok_or(ClientError::MissingField("jwk"))?;
                let payload = self.interpret(&info, &token)?;
                let invite = payload
                    .as_invitation()
                    .ok_or(ClientError::UnexpectedToken(token.header().sub))?;
                Ok(DecryptedMessage::from_invitation(
                    jwk.thumbprint(),
                    token.header().iat,
                    invite,
                ))
            }
            Subject::Reply | Subject::ReplyToInvite => {
                let from_me = self.verify_sender(&info, &token)?;
                let payload = self.interpret(&info, &token)?;
                let reply = payload
                    .as_reply()
                    .ok_or(ClientError::UnexpectedToken(token.header().sub))?;
                let from = if from_me {
                    self.thumbprint.clone()
                } else {
                    info.peer_signing_key.thumbprint()
                };
                Ok(DecryptedMessage::from_reply(from, token.header().iat, reply))
            }
            sub => Err(ClientError::UnexpectedToken(sub)),
        }
    }

    /// Decrypt a whole thread in display order.
    ///
    /// The invitation renders first; replies sort chronologically by
    /// signing time with a hex-string id tie-break, then an acknowledgment
    /// pass moves any message ahead of a reply that acknowledges it, so
    /// causal order survives clock skew between the two parties.
    pub fn decrypt_thread(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<DecryptedMessage>, ClientError> {
        let info = self.thread_info(thread_id)?;
        let stored = self
            .storage
            .get_list(&StorageKey::KeyedMessages(self.thumbprint.clone(), thread_id.clone()))?;

        let mut replies = stored
            .iter()
            .map(|text| self.decrypt_message(thread_id, text))
            .collect::<Result<Vec<_>, _>>()?;
        replies.sort_by(|a, b| a.iat.cmp(&b.iat).then_with(|| a.message_id.cmp_hex(b.message_id)));

        // An author who embeds minAck >= some peer id has already seen that
        // message; it must render before theirs. Bounded bubble passes keep
        // a pathological (non-causal) acknowledgment cycle from looping.
        for _ in 0..replies.len() {
            let mut changed = false;
            for i in 0..replies.len().saturating_sub(1) {
                let acknowledges = replies[i].from != replies[i + 1].from
                    && replies[i].min_ack.is_some_and(|ack| ack >= replies[i + 1].message_id);
                if acknowledges {
                    replies.swap(i, i + 1);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut views = vec![self.decrypt_message(thread_id, &info.invitation)?];
        views.extend(replies);
        Ok(views)
    }

    /// Produce a signed `grid-backup` token of this identity's full state.
    ///
    /// Identity keys are re-wrapped under `password`; thread keys travel
    /// as their stored self-encrypted tokens and decrypt again once the
    /// storage key is restored.
    pub fn make_backup(&self, password: &str) -> Result<SignedToken, ClientError> {
        let mut invitations = BTreeMap::new();
        let mut thread_keys = BTreeMap::new();
        for thread_key in self.invitations()? {
            if let Some(token) = self.storage.get(&StorageKey::Invitation(thread_key.clone()))? {
                invitations.insert(thread_key.to_string(), token);
            }
            if let Some(token) =
                self.storage.get(&StorageKey::EncryptedThreadKey(thread_key.clone()))?
            {
                thread_keys.insert(thread_key.to_string(), token);
            }
        }

        let mut threads = BTreeMap::new();
        let mut messages = BTreeMap::new();
        for thread_id in self.threads()? {
            let info = self.thread_info(&thread_id)?;
            if let Some(token) =
                self.storage.get(&StorageKey::EncryptedThreadKey(info.my_thread_key.clone()))?
            {
                thread_keys.insert(info.my_thread_key.to_string(), token);
            }
            messages.insert(
                thread_id.to_string(),
                self.storage.get_list(&StorageKey::KeyedMessages(
                    self.thumbprint.clone(),
                    thread_id.clone(),
                ))?,
            );
            threads.insert(thread_id.to_string(), info);
        }

        let payload = BackupPayload {
            identity: self.identity.to_stored(password)?,
            invitations,
            thread_keys,
            threads,
            messages,
        };
        let header =
            TokenHeader::new(Subject::Backup).with_jwk(self.identity.signing_public_jwk()?);
        Ok(SignedToken::sign(header, &Body::from_value(&payload)?, self.identity.signing())?)
    }

    /// Restore a client from a `grid-backup` token into `storage`.
    ///
    /// The backup must self-verify and its embedded key must match the
    /// identity record it carries; the password must unlock that record.
    pub fn load_from_backup(
        storage: S,
        token_text: &str,
        password: &str,
    ) -> Result<Client<S>, ClientError> {
        let token = SignedToken::parse(token_text)?;
        if token.header().sub != Subject::Backup {
            return Err(ClientError::UnexpectedToken(token.header().sub));
        }
        token.verify(None)?;
        let payload: BackupPayload = token.body().parse_as()?;
        let embedded = token.header().jwk.as_ref().ok_or(ClientError::MissingField("jwk"))?;
        if embedded.thumbprint() != payload.identity.thumbprint {
            return Err(ClientError::InvalidSignature);
        }

        let identity = Identity::load(&payload.identity, password)?;
        let thumbprint = payload.identity.thumbprint.clone();

        storage.set(
            &StorageKey::Identity(thumbprint.clone()),
            serde_json::to_string(&payload.identity).map_err(StorageError::from)?,
        )?;
        for (key_text, invitation) in &payload.invitations {
            let thread_key = Thumbprint::parse(key_text)?;
            storage.set(&StorageKey::Invitation(thread_key), invitation.clone())?;
            storage.append(
                &StorageKey::Invitations(thumbprint.clone()),
                key_text.clone(),
                true,
            )?;
        }
        for (key_text, token) in &payload.thread_keys {
            let thread_key = Thumbprint::parse(key_text)?;
            storage.set(&StorageKey::EncryptedThreadKey(thread_key), token.clone())?;
        }
        for (id_text, info) in &payload.threads {
            let thread_id = ThreadId::parse(id_text)?;
            storage.set(
                &StorageKey::ThreadInfo(thumbprint.clone(), thread_id),
                serde_json::to_string(info).map_err(StorageError::from)?,
            )?;
            storage.append(&StorageKey::Threads(thumbprint.clone()), id_text.clone(), true)?;
        }
        for (id_text, log) in &payload.messages {
            let thread_id = ThreadId::parse(id_text)?;
            storage.set(
                &StorageKey::KeyedMessages(thumbprint.clone(), thread_id),
                serde_json::to_string(log).map_err(StorageError::from)?,
            )?;
        }

        debug!(thumbprint = %thumbprint, threads = payload.threads.len(), "restored from backup");
        Ok(Client { storage, identity, thumbprint, events: VecDeque::new() })
    }

    fn ingest_reply_to_invite(&mut self, token: &SignedToken) -> Result<Appended, ClientError> {
        let invite_key = token.header().invite.clone().ok_or(ClientError::MissingField("invite"))?;
        let peer_epk = token.header().epk.clone().ok_or(ClientError::MissingField("epk"))?;
        let thread_id = ThreadId::derive(&invite_key, &peer_epk.thumbprint());

        let (mut info, created) = match self.try_thread_info(&thread_id)? {
            Some(info) => (info, false),
            None => {
                let invitation_text = self
                    .storage
                    .get(&StorageKey::Invitation(invite_key.clone()))?
                    .ok_or_else(|| ClientError::InvitationNotFound(invite_key.clone()))?;
                let peer_signing =
                    token.header().jwk.clone().ok_or(ClientError::MissingField("jwk"))?;
                let invitation = SignedToken::parse(&invitation_text)?;
                let invite: InvitationPayload = invitation.body().parse_as()?;

                let mut ordering = ThreadOrdering::new();
                // The invitation opened this party's send sequence.
                ordering.record_syn(invite.message_id)?;

                let info = ThreadInfo {
                    invitation: invitation_text,
                    my_thread_key: invite_key.clone(),
                    peer_epk: peer_epk.clone(),
                    peer_signing_key: peer_signing,
                    ordering,
                    relays: BTreeMap::new(),
                };
                (info, true)
            }
        };

        let from_me = self.verify_sender(&info, token)?;
        let reply = self.decrypt_reply(&info, token)?;

        if created {
            self.storage.append(
                &StorageKey::Threads(self.thumbprint.clone()),
                thread_id.to_string(),
                true,
            )?;
            debug!(thread = %thread_id, "thread established from reply-to-invite");
            self.events.push_back(ClientEvent::ThreadCreated { thread_id: thread_id.clone() });
        }
        self.admit(&thread_id, &mut info, &reply, from_me, token.as_str())
    }

    fn ingest_reply(
        &mut self,
        thread_id: &ThreadId,
        token: &SignedToken,
    ) -> Result<Appended, ClientError> {
        let mut info = self.thread_info(thread_id)?;
        let from_me = self.verify_sender(&info, token)?;
        let reply = self.decrypt_reply(&info, token)?;
        self.admit(thread_id, &mut info, &reply, from_me, token.as_str())
    }

    /// Run a decrypted reply through the ordering window and persist it
    /// when admitted.
    fn admit(
        &mut self,
        thread_id: &ThreadId,
        info: &mut ThreadInfo,
        reply: &ReplyPayload,
        from_me: bool,
        token_text: &str,
    ) -> Result<Appended, ClientError> {
        // A token already present in the stored log is a re-delivery
        // (relay echo, repeated fetch), whatever the ordering window would
        // say about its id.
        let log = StorageKey::KeyedMessages(self.thumbprint.clone(), thread_id.clone());
        if self.storage.get_list(&log)?.iter().any(|stored| stored == token_text) {
            debug!(thread = %thread_id, id = %reply.message_id, "stored message re-delivered");
            return Ok(Appended::Duplicate {
                thread_id: thread_id.clone(),
                message_id: reply.message_id,
            });
        }

        if from_me {
            // An own message absent from the log continues the recorded
            // send sequence (restored log).
            info.ordering.record_syn(reply.message_id)?;
        } else if !info.ordering.accept(reply.message_id)? {
            return Ok(Appended::Duplicate {
                thread_id: thread_id.clone(),
                message_id: reply.message_id,
            });
        }

        if let Some(url) = &reply.relay {
            if url.starts_with("https://") || url.starts_with("http://") {
                let author = if from_me {
                    self.thumbprint.clone()
                } else {
                    info.peer_signing_key.thumbprint()
                };
                info.relays.insert(author.to_string(), url.clone());
                self.events.push_back(ClientEvent::RelayLearned {
                    thread_id: thread_id.clone(),
                    thumbprint: author,
                    url: url.clone(),
                });
            } else {
                warn!(thread = %thread_id, url = %url, "ignoring non-HTTP relay announcement");
            }
        }

        self.storage.append(&log, token_text.to_string(), true)?;
        self.save_thread(thread_id, info)?;
        self.events.push_back(ClientEvent::MessageAppended {
            thread_id: thread_id.clone(),
            message_id: reply.message_id,
        });
        Ok(Appended::Added { thread_id: thread_id.clone(), message_id: reply.message_id })
    }

    /// Verify a token against the keys this thread recognizes.
    ///
    /// Returns whether the author is this party. The embedded header key,
    /// when present, only selects which recorded key to check against.
    fn verify_sender(&self, info: &ThreadInfo, token: &SignedToken) -> Result<bool, ClientError> {
        let my_key = self.identity.signing_public_jwk()?;
        match &token.header().jwk {
            Some(jwk) => {
                let claimed = jwk.thumbprint();
                if claimed == self.thumbprint {
                    token.verify(Some(&my_key)).map_err(|_| ClientError::InvalidSignature)?;
                    Ok(true)
                } else if claimed == info.peer_signing_key.thumbprint() {
                    token
                        .verify(Some(&info.peer_signing_key))
                        .map_err(|_| ClientError::InvalidSignature)?;
                    Ok(false)
                } else {
                    Err(ClientError::InvalidSignature)
                }
            }
            None => {
                if token.verify(Some(&info.peer_signing_key)).is_ok() {
                    Ok(false)
                } else if token.verify(Some(&my_key)).is_ok() {
                    Ok(true)
                } else {
                    Err(ClientError::InvalidSignature)
                }
            }
        }
    }

    /// Decrypt and type a conversation token's payload against an
    /// established thread. Trust decisions happen before this; callers
    /// verify the signature first.
    fn interpret(
        &self,
        info: &ThreadInfo,
        token: &SignedToken,
    ) -> Result<MessagePayload, ClientError> {
        match token.header().sub {
            Subject::Invitation => Ok(MessagePayload::Invitation(token.body().parse_as()?)),
            Subject::Reply => Ok(MessagePayload::Reply(self.decrypt_reply(info, token)?)),
            Subject::ReplyToInvite => {
                let invite =
                    token.header().invite.clone().ok_or(ClientError::MissingField("invite"))?;
                let epk = token.header().epk.clone().ok_or(ClientError::MissingField("epk"))?;
                Ok(MessagePayload::ReplyToInvite {
                    invite,
                    epk,
                    reply: self.decrypt_reply(info, token)?,
                })
            }
            sub => Err(ClientError::UnexpectedToken(sub)),
        }
    }

    fn decrypt_reply(
        &self,
        info: &ThreadInfo,
        token: &SignedToken,
    ) -> Result<ReplyPayload, ClientError> {
        let iv = token.header().iv.as_ref().ok_or(ClientError::MissingField("iv"))?;
        let secret = self.thread_secret(info)?;
        let text = decrypt_payload(&secret, iv, token.payload_text())?;
        Ok(serde_json::from_str(&text).map_err(TokenError::from)?)
    }

    fn thread_secret(&self, info: &ThreadInfo) -> Result<SharedSecret, ClientError> {
        let pair = self.identity.thread_key(&self.storage, &info.my_thread_key).map_err(
            |err| match err {
                IdentityError::ThreadKeyNotFound(key) => ClientError::InvitationNotFound(key),
                other => other.into(),
            },
        )?;
        Ok(pair.derive_shared_secret(&info.peer_epk)?)
    }

    fn thread_info(&self, thread_id: &ThreadId) -> Result<ThreadInfo, ClientError> {
        self.try_thread_info(thread_id)?
            .ok_or_else(|| ClientError::ThreadNotFound(thread_id.clone()))
    }

    fn try_thread_info(&self, thread_id: &ThreadId) -> Result<Option<ThreadInfo>, ClientError> {
        match self
            .storage
            .get(&StorageKey::ThreadInfo(self.thumbprint.clone(), thread_id.clone()))?
        {
            Some(text) => Ok(Some(serde_json::from_str(&text).map_err(StorageError::from)?)),
            None => Ok(None),
        }
    }

    fn save_thread(&self, thread_id: &ThreadId, info: &ThreadInfo) -> Result<(), ClientError> {
        self.storage.set(
            &StorageKey::ThreadInfo(self.thumbprint.clone(), thread_id.clone()),
            serde_json::to_string(info).map_err(StorageError::from)?,
        )?;
        Ok(())
    }
}
