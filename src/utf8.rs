//! Decodificación UTF-8.
//!
//! Se implementa el diseño original de UTF-8 (RFC 2279), el cual
//! admite secuencias de hasta seis bytes. Las formas de cinco y seis
//! bytes producen puntos de código fuera del rango de [`char`], por
//! lo cual un punto de código se representa como un entero sin signo.

/// Un punto de código Unicode, o el centinela [`INVALID`].
pub type CodePoint = u32;

/// Centinela de fallo: fin de búfer o secuencia malformada.
pub const INVALID: CodePoint = 0;

/// Decodifica el punto de código que inicia en `*cursor`.
///
/// El cursor avanza más allá de todos los bytes inspeccionados, incluso
/// cuando la secuencia resulta inválida. En caso de fin de búfer, byte
/// inicial inválido, secuencia truncada o byte de continuación que no
/// cumple con `10xxxxxx`, se retorna [`INVALID`].
pub fn decode(bytes: &[u8], cursor: &mut usize) -> CodePoint {
    let lead = match bytes.get(*cursor) {
        Some(&lead) => lead,
        None => return INVALID,
    };

    *cursor += 1;

    let (continuations, payload) = match lead {
        0x00..=0x7f => return lead as CodePoint,
        0xc0..=0xdf => (1, lead & 0x1f),
        0xe0..=0xef => (2, lead & 0x0f),
        0xf0..=0xf7 => (3, lead & 0x07),
        0xf8..=0xfb => (4, lead & 0x03),
        0xfc..=0xfd => (5, lead & 0x01),

        // Continuación en posición inicial, o 0xfe/0xff
        _ => return INVALID,
    };

    let mut code_point = payload as CodePoint;
    for _ in 0..continuations {
        let byte = match bytes.get(*cursor) {
            Some(&byte) => byte,
            None => return INVALID,
        };

        *cursor += 1;
        if byte & 0xc0 != 0x80 {
            return INVALID;
        }

        code_point = (code_point << 6) | (byte & 0x3f) as CodePoint;
    }

    code_point
}

/// Convierte un punto de código a [`char`], si es representable.
pub fn to_char(code_point: CodePoint) -> Option<char> {
    char::from_u32(code_point)
}
