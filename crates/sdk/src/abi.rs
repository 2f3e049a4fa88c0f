//! Minimal Solidity ABI codec for the Otter contract surface
//!
//! Only the shapes the client actually exchanges are supported: static
//! words (`uint256`, `address`, `bool`, `bytes32`) and `string`, either as
//! call arguments or inside the registry's `getPool` return tuple.

use otter_types::{Address, OtterError, OtterResult, PoolRecord, RoleId, U256};

const WORD: usize = 32;

/// Four-byte function selectors (`keccak256(signature)[..4]`)
pub mod selectors {
    use hex_literal::hex;

    pub type Selector = [u8; 4];

    // Registry
    /// `poolCount()`
    pub const POOL_COUNT: Selector = hex!("f525cb68");
    /// `getPool(uint256)`
    pub const GET_POOL: Selector = hex!("068bcd8d");
    /// `proposePool(string,uint256,uint256,uint256)`
    pub const PROPOSE_POOL: Selector = hex!("a1ffbfd8");
    /// `activatePool(uint256)`
    pub const ACTIVATE_POOL: Selector = hex!("08f747dd");
    /// `rejectPool(uint256)`
    pub const REJECT_POOL: Selector = hex!("e350617c");

    // Access manager
    /// `hasRole(bytes32,address)`
    pub const HAS_ROLE: Selector = hex!("91d14854");

    // Settlement token
    /// `balanceOf(address)`, shared with the vault share balance
    pub const BALANCE_OF: Selector = hex!("70a08231");
    /// `allowance(address,address)`
    pub const ALLOWANCE: Selector = hex!("dd62ed3e");
    /// `approve(address,uint256)`
    pub const APPROVE: Selector = hex!("095ea7b3");
    /// `mint(address,uint256)`
    pub const MINT: Selector = hex!("40c10f19");

    // Tranche vault
    /// `deposit(uint256)`
    pub const DEPOSIT: Selector = hex!("b6b55f25");
    /// `withdraw(uint256)`
    pub const WITHDRAW: Selector = hex!("2e1a7d4d");
    /// `harvest()`
    pub const HARVEST: Selector = hex!("4641257d");
    /// `pendingRewards(address)`
    pub const PENDING_REWARDS: Selector = hex!("31d7a262");
    /// `totalAssets()`
    pub const TOTAL_ASSETS: Selector = hex!("01e1d114");

    // Revenue oracle, escrow, distributor
    /// `postRevenue(uint256,uint256,uint256)`
    pub const POST_REVENUE: Selector = hex!("56d89f68");
    /// `getRevenue(uint256,uint256)`
    pub const GET_REVENUE: Selector = hex!("f0829f3e");
    /// `depositRevenue(uint256,uint256,uint256)`
    pub const DEPOSIT_REVENUE: Selector = hex!("dcda84ba");
    /// `getEscrowedAmount(uint256,uint256)`
    pub const GET_ESCROWED_AMOUNT: Selector = hex!("152b0bd8");
    /// `distribute(uint256,uint256)`
    pub const DISTRIBUTE: Selector = hex!("7625391a");
    /// `isDistributed(uint256,uint256)`
    pub const IS_DISTRIBUTED: Selector = hex!("e96e20fb");
}

/// Event topic hashes (`keccak256(signature)`)
pub mod topics {
    use hex_literal::hex;

    pub type Topic = [u8; 32];

    /// `PoolProposed(uint256,address,string)`
    pub const POOL_PROPOSED: Topic =
        hex!("15641a0a2cd10a1da32c342c0754e68a1b92cef8125c335c1af3e3dd63e5f36f");
    /// `PoolActivated(uint256,address,address)`
    pub const POOL_ACTIVATED: Topic =
        hex!("f8753abc7cfe153865705a30162ef97c77ed9032bde9e4cc7057e211427d71eb");
    /// `PoolRejected(uint256)`
    pub const POOL_REJECTED: Topic =
        hex!("a23be5f402ac478f5018c9bd81631d54a8357623c088a150684e6a281dd0848e");
    /// `Distributed(uint256,uint256,uint256,uint256,uint256)`
    pub const DISTRIBUTED: Topic =
        hex!("b73f574d3938a4a6a7f1b40567d099c03e92300e3124649e8285baaef0cc00c2");
    /// `Deposit(address,address,uint256,uint256)`
    pub const DEPOSIT: Topic =
        hex!("dcbc1c05240f31ff3ad067ef1ee35ce4997762752e3a095284754544f4c709d7");
    /// `Withdraw(address,address,address,uint256,uint256)`
    pub const WITHDRAW: Topic =
        hex!("fbde797d201c681b91056529119e0b02407c7bb96a4a2c75c01fc9667232c8db");
    /// `Harvest(address,uint256)`
    pub const HARVEST: Topic =
        hex!("c9695243a805adb74c91f28311176c65b417e842d5699893cef56d18bfa48cba");
    /// `RewardsAdded(uint256)`
    pub const REWARDS_ADDED: Topic =
        hex!("f8fad42e780bfa5459be3fe691e8ba1aec70342250112139c5771c3fd155f312");
}

// ============================================================================
// Encoding
// ============================================================================

/// ABI value supported by the encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(U256),
    Address(Address),
    FixedBytes([u8; 32]),
    Bool(bool),
    String(String),
}

impl Token {
    pub fn uint(value: u64) -> Self {
        Token::Uint(U256::from(value))
    }

    pub fn role(role: RoleId) -> Self {
        Token::FixedBytes(*role.as_bytes())
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Token::String(_))
    }
}

pub fn uint_word(value: U256) -> [u8; 32] {
    value.to_be_bytes()
}

pub fn address_word(address: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn static_word(token: &Token) -> [u8; 32] {
    match token {
        Token::Uint(value) => uint_word(*value),
        Token::Address(address) => address_word(*address),
        Token::FixedBytes(bytes) => *bytes,
        Token::Bool(flag) => uint_word(if *flag { U256::ONE } else { U256::ZERO }),
        Token::String(_) => unreachable!("dynamic token has no static word"),
    }
}

/// Encode a tuple of tokens (head/tail layout)
pub fn encode_tokens(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if let Token::String(text) = token {
            let offset = U256::from((head_len + tail.len()) as u64);
            head.extend_from_slice(&uint_word(offset));

            let bytes = text.as_bytes();
            tail.extend_from_slice(&uint_word(U256::from(bytes.len() as u64)));
            tail.extend_from_slice(bytes);
            let padding = (WORD - bytes.len() % WORD) % WORD;
            tail.extend(std::iter::repeat(0u8).take(padding));
        } else {
            debug_assert!(!token.is_dynamic());
            head.extend_from_slice(&static_word(token));
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Calldata: selector followed by the encoded arguments
pub fn encode_call(selector: selectors::Selector, args: &[Token]) -> Vec<u8> {
    let mut data = selector.to_vec();
    data.extend_from_slice(&encode_tokens(args));
    data
}

// ============================================================================
// Decoding
// ============================================================================

/// Cursor-free reader over ABI-encoded return data
pub struct Decoder<'a> {
    data: &'a [u8],
    context: &'static str,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8], context: &'static str) -> Self {
        Self { data, context }
    }

    fn err(&self, reason: &str) -> OtterError {
        OtterError::decode(self.context, reason)
    }

    /// 32-byte word at byte offset `at`
    pub fn word_at(&self, at: usize) -> OtterResult<&'a [u8]> {
        let end = at.checked_add(WORD).ok_or_else(|| self.err("offset overflow"))?;
        self.data
            .get(at..end)
            .ok_or_else(|| self.err(&format!("need {} bytes, have {}", end, self.data.len())))
    }

    pub fn uint_at(&self, at: usize) -> OtterResult<U256> {
        let word = self.word_at(at)?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(word);
        Ok(U256::from_be_bytes(bytes))
    }

    pub fn uint(&self, index: usize) -> OtterResult<U256> {
        self.uint_at(index * WORD)
    }

    pub fn address_at(&self, at: usize) -> OtterResult<Address> {
        let word = self.word_at(at)?;
        if word[..12].iter().any(|b| *b != 0) {
            return Err(self.err("address word has dirty high bytes"));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Ok(Address(bytes))
    }

    pub fn address(&self, index: usize) -> OtterResult<Address> {
        self.address_at(index * WORD)
    }

    pub fn bool(&self, index: usize) -> OtterResult<bool> {
        let value = self.uint(index)?;
        if value == U256::ZERO {
            Ok(false)
        } else if value == U256::ONE {
            Ok(true)
        } else {
            Err(self.err("bool word is neither 0 nor 1"))
        }
    }

    fn offset_at(&self, at: usize) -> OtterResult<usize> {
        let value = self.uint_at(at)?;
        if value > U256::from(self.data.len() as u64) {
            return Err(self.err("offset points past the end of the data"));
        }
        Ok(value.into_words().1 as usize)
    }

    /// `string` whose offset word sits at `head_at`, relative to `base`
    pub fn string_at(&self, base: usize, head_at: usize) -> OtterResult<String> {
        let start = base + self.offset_at(head_at)?;
        let len_word = self.uint_at(start)?;
        if len_word > U256::from(self.data.len() as u64) {
            return Err(self.err("string length exceeds data"));
        }
        let len = len_word.into_words().1 as usize;
        let body = start + WORD;
        let bytes = self
            .data
            .get(body..body + len)
            .ok_or_else(|| self.err("string body truncated"))?;
        String::from_utf8(bytes.to_vec()).map_err(|_| self.err("string is not valid UTF-8"))
    }

    pub fn string(&self, index: usize) -> OtterResult<String> {
        self.string_at(0, index * WORD)
    }
}

/// Decode the registry's `getPool` return value (a single dynamic tuple)
pub fn decode_pool_record(data: &[u8]) -> OtterResult<PoolRecord> {
    let decoder = Decoder::new(data, "getPool");
    let base = decoder.offset_at(0)?;
    let field = |i: usize| base + i * WORD;

    Ok(PoolRecord {
        issuer: decoder.address_at(field(0))?,
        metadata_cid: decoder.string_at(base, field(1))?,
        epoch_seconds: decoder.uint_at(field(2))?,
        start_time: decoder.uint_at(field(3))?,
        senior_split_bps: decoder.uint_at(field(4))?,
        status: decoder.uint_at(field(5))?,
        senior_vault: decoder.address_at(field(6))?,
        junior_vault: decoder.address_at(field(7))?,
    })
}

/// Encode a `getPool` return value; the inverse of [`decode_pool_record`]
pub fn encode_pool_record(record: &PoolRecord) -> Vec<u8> {
    let tuple = encode_tokens(&[
        Token::Address(record.issuer),
        Token::String(record.metadata_cid.clone()),
        Token::Uint(record.epoch_seconds),
        Token::Uint(record.start_time),
        Token::Uint(record.senior_split_bps),
        Token::Uint(record.status),
        Token::Address(record.senior_vault),
        Token::Address(record.junior_vault),
    ]);
    let mut data = uint_word(U256::from(WORD as u64)).to_vec();
    data.extend_from_slice(&tuple);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> PoolRecord {
        PoolRecord {
            issuer: "0x70997970c51812dc3a010c7d01b50e0d17dc79c8".parse().unwrap(),
            metadata_cid: "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".to_string(),
            epoch_seconds: U256::new(2_592_000),
            start_time: U256::new(1_735_689_600),
            senior_split_bps: U256::new(7000),
            status: U256::ONE,
            senior_vault: Address([0xaa; 20]),
            junior_vault: Address([0xbb; 20]),
        }
    }

    #[test]
    fn test_selector_and_topic_constants() {
        assert_eq!(selectors::POOL_COUNT, [0xf5, 0x25, 0xcb, 0x68]);
        assert_eq!(selectors::IS_DISTRIBUTED, [0xe9, 0x6e, 0x20, 0xfb]);
        assert_eq!(topics::REWARDS_ADDED[0], 0xf8);
        assert_eq!(topics::REWARDS_ADDED[31], 0x12);
        assert_eq!(
            otter_types::encode_hex(&topics::POOL_PROPOSED),
            "0x15641a0a2cd10a1da32c342c0754e68a1b92cef8125c335c1af3e3dd63e5f36f"
        );
    }

    #[test]
    fn test_encode_static_call() {
        let account: Address = "0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap();
        let data = encode_call(selectors::BALANCE_OF, &[Token::Address(account)]);
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..], account.as_bytes());
    }

    #[test]
    fn test_encode_deposit_amount() {
        let data = encode_call(selectors::DEPOSIT, &[Token::Uint(U256::new(1_000_000_000))]);
        let decoder = Decoder::new(&data[4..], "deposit");
        assert_eq!(decoder.uint(0).unwrap(), U256::new(1_000_000_000));
    }

    #[test]
    fn test_encode_string_argument() {
        let data = encode_tokens(&[Token::String("abc".to_string()), Token::uint(30)]);
        // head: offset + uint, tail: length + one padded word
        assert_eq!(data.len(), 4 * 32);
        let decoder = Decoder::new(&data, "proposePool");
        assert_eq!(decoder.uint(0).unwrap(), U256::new(64));
        assert_eq!(decoder.uint(1).unwrap(), U256::new(30));
        assert_eq!(decoder.string(0).unwrap(), "abc");
    }

    #[test]
    fn test_pool_record_layout() {
        let record = sample_record();
        let data = encode_pool_record(&record);
        // outer offset + 8 head words + length word + 2 words of CID
        assert_eq!(data.len(), 32 + 8 * 32 + 32 + 64);
        assert_eq!(decode_pool_record(&data).unwrap(), record);
    }

    #[test]
    fn test_truncated_pool_record_is_rejected() {
        let data = encode_pool_record(&sample_record());
        assert!(decode_pool_record(&data[..200]).is_err());
        assert!(decode_pool_record(&[]).is_err());
    }

    #[test]
    fn test_dirty_address_word_is_rejected() {
        let mut word = [0u8; 32];
        word[0] = 1;
        let decoder = Decoder::new(&word, "address");
        assert!(decoder.address(0).is_err());
    }

    #[test]
    fn test_bool_decoding() {
        let decoder = Decoder::new(&[0u8; 32], "hasRole");
        assert!(!decoder.bool(0).unwrap());

        let one = uint_word(U256::ONE);
        assert!(Decoder::new(&one, "hasRole").bool(0).unwrap());

        let two = uint_word(U256::new(2));
        assert!(Decoder::new(&two, "hasRole").bool(0).is_err());
    }
}
