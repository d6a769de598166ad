// Id generation (nanoid).

pub const DEFAULT_ID_SIZE: usize = 32;

const ALPHABET: [char; 62] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L',
    'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4',
    '5', '6', '7', '8', '9',
];

/// Alphanumeric id, `DEFAULT_ID_SIZE` characters unless `size` is given.
pub fn generate_id(size: Option<usize>) -> String {
    let len = size.unwrap_or(DEFAULT_ID_SIZE);
    nanoid::nanoid!(len, &ALPHABET)
}
