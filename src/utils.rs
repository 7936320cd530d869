use crate::errors::ExceptionalHalt;
use ethereum_types::{Address, H256, U256};
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(&Keccak256::digest(data.as_ref()))
}

/// Narrows a stack word to an address by taking its low 20 bytes.
pub fn word_to_address(word: U256) -> Address {
    let bytes = word.to_big_endian();
    Address::from_slice(&bytes[12..])
}

/// Widens an address into a stack word, big-endian in the low 20 bytes.
pub fn address_to_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

pub fn u256_to_h256(value: U256) -> H256 {
    H256(value.to_big_endian())
}

pub fn h256_to_u256(value: H256) -> U256 {
    U256::from_big_endian(value.as_bytes())
}

pub fn u256_to_usize(value: U256) -> Result<usize, ExceptionalHalt> {
    value
        .try_into()
        .map_err(|_| ExceptionalHalt::MemoryOffsetOverflow)
}

/// Converts a (size, offset) operand pair into native sizes. A zero size
/// short-circuits so that unreachable offsets in empty accesses never fail.
pub fn size_offset_to_usize(size: U256, offset: U256) -> Result<(usize, usize), ExceptionalHalt> {
    let size = u256_to_usize(size)?;
    if size == 0 {
        return Ok((0, 0));
    }
    Ok((size, u256_to_usize(offset)?))
}

/// Address of a contract deployed with CREATE or a create transaction:
/// `keccak(rlp([sender, nonce]))[12..]`.
pub fn calculate_create_address(deployer: Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(&deployer);
    stream.append(&nonce);
    let hash = keccak(stream.out());
    Address::from_slice(&hash.as_bytes()[12..])
}

/// Address of a contract deployed with CREATE2:
/// `keccak(0xff ++ sender ++ salt ++ keccak(init_code))[12..]`.
pub fn calculate_create2_address(deployer: Address, init_code: &[u8], salt: U256) -> Address {
    let init_code_hash = keccak(init_code);

    let mut hasher = Keccak256::new();
    hasher.update([0xff]);
    hasher.update(deployer.as_bytes());
    hasher.update(salt.to_big_endian());
    hasher.update(init_code_hash.as_bytes());
    let hash = hasher.finalize();

    Address::from_slice(&hash[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_address_round_trip_masks_to_low_20_bytes() {
        let address = Address::from_slice(&[0xab; 20]);
        assert_eq!(word_to_address(address_to_word(address)), address);

        // High 12 bytes of the word are ignored.
        let mut bytes = [0xff; 32];
        bytes[12..].copy_from_slice(&[0xab; 20]);
        assert_eq!(word_to_address(U256::from_big_endian(&bytes)), address);
    }

    #[test]
    fn create_address_matches_known_vector() {
        // keccak(rlp([0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0, 0]))[12..]
        let deployer = Address::from_slice(
            &hex::decode("6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0").unwrap(),
        );
        let created = calculate_create_address(deployer, 0);
        assert_eq!(
            created,
            Address::from_slice(&hex::decode("cd234a471b72ba2f1ccf0a70fcaba648a5eecd8d").unwrap())
        );
    }

    #[test]
    fn create2_address_matches_known_vector() {
        // EIP-1014 example 1: deployer 0x00..00, salt 0, init code 0x00.
        let created = calculate_create2_address(Address::zero(), &[0x00], U256::zero());
        assert_eq!(
            created,
            Address::from_slice(&hex::decode("4d1a2e2bb4f88f0250f26ffff098b0b30b26bf38").unwrap())
        );
    }

    #[test]
    fn zero_size_accepts_any_offset() {
        assert_eq!(
            size_offset_to_usize(U256::zero(), U256::MAX).unwrap(),
            (0, 0)
        );
        assert!(size_offset_to_usize(U256::one(), U256::MAX).is_err());
    }
}
