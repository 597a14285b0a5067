//! Composite key encoding
//!
//! Keys are decimal identifiers joined by a NUL byte, which can never occur
//! inside a decimal identifier:
//!
//! ```text
//! messages: {guild}\0{channel}\0{message}
//! members:  {guild}\0{user}
//! ```
//!
//! A channel prefix ends with the separator, so the prefix for channel `1`
//! does not match keys of channel `11`.

use modlog_core::{ChannelId, GuildId, MessageId, Snowflake, UserId};

use crate::error::StorageError;

/// Separator between key components
pub const KEY_SEPARATOR: u8 = 0;

fn push_component(key: &mut Vec<u8>, id: Snowflake) {
    key.extend_from_slice(id.to_string().as_bytes());
}

/// Key of a single message record
pub fn message_key(guild: GuildId, channel: ChannelId, message: MessageId) -> Vec<u8> {
    let mut key = channel_prefix(guild, channel);
    push_component(&mut key, message);
    key
}

/// Prefix shared by every message of a channel
pub fn channel_prefix(guild: GuildId, channel: ChannelId) -> Vec<u8> {
    let mut key = guild_prefix(guild);
    push_component(&mut key, channel);
    key.push(KEY_SEPARATOR);
    key
}

/// Prefix shared by every key of a guild, in either table
pub fn guild_prefix(guild: GuildId) -> Vec<u8> {
    let mut key = Vec::with_capacity(64);
    push_component(&mut key, guild);
    key.push(KEY_SEPARATOR);
    key
}

/// Key of a single member record
pub fn member_key(guild: GuildId, user: UserId) -> Vec<u8> {
    let mut key = guild_prefix(guild);
    push_component(&mut key, user);
    key
}

fn decode_components<const N: usize>(key: &[u8]) -> Result<[Snowflake; N], StorageError> {
    let corrupted = || StorageError::Corrupted(String::from_utf8_lossy(key).replace('\0', "/"));

    let mut ids = [Snowflake::default(); N];
    let mut parts = key.split(|b| *b == KEY_SEPARATOR);
    for slot in ids.iter_mut() {
        let part = parts.next().ok_or_else(corrupted)?;
        let text = std::str::from_utf8(part).map_err(|_| corrupted())?;
        *slot = Snowflake::parse(text).map_err(|_| corrupted())?;
    }
    if parts.next().is_some() {
        return Err(corrupted());
    }
    Ok(ids)
}

/// Decode a message key into (guild, channel, message)
pub fn decode_message_key(key: &[u8]) -> Result<(GuildId, ChannelId, MessageId), StorageError> {
    let [guild, channel, message] = decode_components::<3>(key)?;
    Ok((guild, channel, message))
}

/// Decode a member key into (guild, user)
pub fn decode_member_key(key: &[u8]) -> Result<(GuildId, UserId), StorageError> {
    let [guild, user] = decode_components::<2>(key)?;
    Ok((guild, user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_key_layout() {
        let key = message_key(Snowflake(1), Snowflake(22), Snowflake(333));
        assert_eq!(key, b"1\x0022\x00333".to_vec());
        assert!(key.starts_with(&channel_prefix(Snowflake(1), Snowflake(22))));
        assert!(key.starts_with(&guild_prefix(Snowflake(1))));
    }

    #[test]
    fn test_channel_prefix_is_unambiguous() {
        let short = channel_prefix(Snowflake(1), Snowflake(1));
        let key_in_eleven = message_key(Snowflake(1), Snowflake(11), Snowflake(5));
        assert!(!key_in_eleven.starts_with(&short));

        let other_guild = message_key(Snowflake(11), Snowflake(1), Snowflake(5));
        assert!(!other_guild.starts_with(&guild_prefix(Snowflake(1))));
    }

    #[test]
    fn test_decode_message_key() {
        let key = message_key(Snowflake(7), Snowflake(8), Snowflake(9));
        let (g, c, m) = decode_message_key(&key).unwrap();
        assert_eq!((g, c, m), (Snowflake(7), Snowflake(8), Snowflake(9)));
    }

    #[test]
    fn test_decode_member_key() {
        let key = member_key(Snowflake(7), Snowflake(42));
        assert_eq!(decode_member_key(&key).unwrap(), (Snowflake(7), Snowflake(42)));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_message_key(b"1\x002").is_err());
        assert!(decode_message_key(b"1\x002\x003\x004").is_err());
        assert!(decode_message_key(b"1\x00x\x003").is_err());
        assert!(decode_member_key(b"").is_err());

        let err = decode_member_key(b"1\x00").unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(_)));
    }
}
