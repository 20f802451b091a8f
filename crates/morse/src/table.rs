//! The fixed morse encoding table.
//!
//! The mapping is context-free, so decoding a token never depends on its
//! neighbours. Letters decode to upper case, the same way the remote
//! translate service answers.

const TABLE: &[(char, &str)] = &[
    ('A', ".-"),
    ('B', "-..."),
    ('C', "-.-."),
    ('D', "-.."),
    ('E', "."),
    ('F', "..-."),
    ('G', "--."),
    ('H', "...."),
    ('I', ".."),
    ('J', ".---"),
    ('K', "-.-"),
    ('L', ".-.."),
    ('M', "--"),
    ('N', "-."),
    ('O', "---"),
    ('P', ".--."),
    ('Q', "--.-"),
    ('R', ".-."),
    ('S', "..."),
    ('T', "-"),
    ('U', "..-"),
    ('V', "...-"),
    ('W', ".--"),
    ('X', "-..-"),
    ('Y', "-.--"),
    ('Z', "--.."),
    ('1', ".----"),
    ('2', "..---"),
    ('3', "...--"),
    ('4', "....-"),
    ('5', "....."),
    ('6', "-...."),
    ('7', "--..."),
    ('8', "---.."),
    ('9', "----."),
    ('0', "-----"),
    (',', "--..--"),
    ('.', ".-.-.-"),
    ('?', "..--.."),
    ('/', "-..-."),
    ('-', "-....-"),
    ('(', "-.--."),
    (')', "-.--.-"),
    ('\'', ".----."),
    ('!', "-.-.--"),
    (':', "---..."),
    (';', "-.-.-."),
    ('=', "-...-"),
    ('+', ".-.-."),
    ('_', "..--.-"),
    ('"', ".-..-."),
    ('$', "...-..-"),
    ('@', ".--.-."),
    ('&', ".-..."),
];

/// Look up the character for one morse token.
pub fn decode_token(token: &str) -> Option<char> {
    TABLE
        .iter()
        .find(|(_, code)| *code == token)
        .map(|(c, _)| *c)
}

/// Look up the morse token for one character (letters are case-insensitive).
pub fn encode_char(c: char) -> Option<&'static str> {
    let c = c.to_ascii_uppercase();
    TABLE
        .iter()
        .find(|(plain, _)| *plain == c)
        .map(|(_, code)| *code)
}
