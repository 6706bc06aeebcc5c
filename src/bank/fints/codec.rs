//!
//! FinTS 3.0 wire syntax.
//!
//! A message is a sequence of segments terminated by `'`. Segments consist of data elements
//! separated by `+`, data elements of group elements separated by `:`. `?` escapes the next
//! byte and `@len@` introduces `len` bytes of binary data. Text is ISO-8859-1.

use crate::bank::BankError;

/// Parsed segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
	/// Segment type, e.g. `HIRMS`.
	pub kind: String,
	/// Position of the segment in its message.
	pub number: u32,
	pub version: u32,
	/// Number of the request segment this one answers.
	pub reference: Option<u32>,
	/// Data elements after the header, each a list of raw group elements.
	pub elements: Vec<Vec<Vec<u8>>>,
}

impl Segment {
	/// Group elements of the data element at `index`.
	pub fn element(&self, index: usize) -> Option<&[Vec<u8>]> {
		self.elements.get(index).map(Vec::as_slice)
	}

	/// Raw bytes of one group element.
	pub fn bytes(&self, element: usize, group: usize) -> Option<&[u8]> {
		self.elements
			.get(element)
			.and_then(|e| e.get(group))
			.map(Vec::as_slice)
	}

	/// Non-empty text of one group element.
	pub fn text(&self, element: usize, group: usize) -> Option<String> {
		self.bytes(element, group)
			.filter(|b| !b.is_empty())
			.map(decode_latin1)
	}

	fn from_elements(mut elements: Vec<Vec<Vec<u8>>>) -> Result<Self, BankError> {
		if elements.is_empty() {
			return Err(BankError::ParseError("Empty segment".to_string()));
		}
		let header = elements.remove(0);
		let field = |i: usize| header.get(i).map(|f| decode_latin1(f));

		let kind = field(0)
			.filter(|k| !k.is_empty())
			.ok_or_else(|| BankError::ParseError("Segment without type".to_string()))?;
		let number = parse_number(&kind, "number", field(1))?;
		let version = parse_number(&kind, "version", field(2))?;
		let reference = match field(3).filter(|r| !r.is_empty()) {
			Some(r) => Some(r.parse().map_err(|_| {
				BankError::ParseError(format!("Bad reference '{}' in {}", r, kind))
			})?),
			None => None,
		};

		Ok(Self {
			kind,
			number,
			version,
			reference,
			elements,
		})
	}
}

fn parse_number(kind: &str, what: &str, value: Option<String>) -> Result<u32, BankError> {
	value
		.and_then(|v| v.parse().ok())
		.ok_or_else(|| BankError::ParseError(format!("Missing segment {} in {}", what, kind)))
}

/// Decode ISO-8859-1 bytes.
pub fn decode_latin1(bytes: &[u8]) -> String {
	bytes.iter().map(|&b| b as char).collect()
}

/// Encode text as ISO-8859-1, replacing characters outside the charset with `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
	text.chars()
		.map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
		.collect()
}

/// Escape a text value for use as a group element.
pub fn escape(text: &str) -> Vec<u8> {
	let mut out = Vec::with_capacity(text.len());
	for b in encode_latin1(text) {
		if matches!(b, b'?' | b'@' | b'\'' | b'+' | b':') {
			out.push(b'?');
		}
		out.push(b);
	}
	out
}

/// Encode binary data as a group element.
pub fn binary(data: &[u8]) -> Vec<u8> {
	let mut out = format!("@{}@", data.len()).into_bytes();
	out.extend_from_slice(data);
	out
}

/// Parse a message into segments.
///
/// The contents of the encryption envelope (`HNVSD`) are parsed in place, so the result is
/// the flat list of all segments the bank sent.
pub fn parse_segments(data: &[u8]) -> Result<Vec<Segment>, BankError> {
	let mut segments = Vec::new();
	let mut elements: Vec<Vec<Vec<u8>>> = Vec::new();
	let mut groups: Vec<Vec<u8>> = Vec::new();
	let mut field: Vec<u8> = Vec::new();
	let mut in_segment = false;
	let mut i = 0;

	while i < data.len() {
		let b = data[i];
		match b {
			b'\r' | b'\n' if !in_segment => {
				i += 1;
				continue;
			}
			b'?' => {
				let escaped = data
					.get(i + 1)
					.ok_or_else(|| BankError::ParseError("Dangling escape character".to_string()))?;
				field.push(*escaped);
				i += 1;
			}
			b'@' if field.is_empty() => {
				let rest = &data[i + 1..];
				let end = rest
					.iter()
					.position(|&c| c == b'@')
					.ok_or_else(|| BankError::ParseError("Unterminated binary length".to_string()))?;
				let length: usize = std::str::from_utf8(&rest[..end])
					.ok()
					.and_then(|s| s.parse().ok())
					.ok_or_else(|| BankError::ParseError("Bad binary length".to_string()))?;
				let start = i + 1 + end + 1;
				let stop = start
					.checked_add(length)
					.filter(|&stop| stop <= data.len())
					.ok_or_else(|| BankError::ParseError("Binary data exceeds message".to_string()))?;
				field.extend_from_slice(&data[start..stop]);
				i = stop;
				in_segment = true;
				continue;
			}
			b':' => groups.push(std::mem::take(&mut field)),
			b'+' => {
				groups.push(std::mem::take(&mut field));
				elements.push(std::mem::take(&mut groups));
			}
			b'\'' => {
				groups.push(std::mem::take(&mut field));
				elements.push(std::mem::take(&mut groups));
				let segment = Segment::from_elements(std::mem::take(&mut elements))?;
				if segment.kind == "HNVSD" {
					let inner = segment.bytes(0, 0).unwrap_or_default();
					segments.extend(parse_segments(inner)?);
				} else {
					segments.push(segment);
				}
				in_segment = false;
				i += 1;
				continue;
			}
			_ => field.push(b),
		}
		in_segment = true;
		i += 1;
	}

	if in_segment {
		return Err(BankError::ParseError("Message ends inside a segment".to_string()));
	}
	Ok(segments)
}

/// Outgoing segment under construction.
///
/// Group elements are stored already escaped; the segment number is assigned when the
/// message is framed.
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
	kind: &'static str,
	version: u32,
	elements: Vec<Vec<Vec<u8>>>,
}

impl SegmentBuilder {
	pub fn new(kind: &'static str, version: u32) -> Self {
		Self {
			kind,
			version,
			elements: Vec::new(),
		}
	}

	pub fn kind(&self) -> &'static str {
		self.kind
	}

	/// Append a data element holding a single text value.
	pub fn text(mut self, value: &str) -> Self {
		self.elements.push(vec![escape(value)]);
		self
	}

	/// Append an empty data element.
	pub fn empty(mut self) -> Self {
		self.elements.push(vec![Vec::new()]);
		self
	}

	/// Append a data element group made of text values.
	pub fn group<I, S>(mut self, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.elements
			.push(values.into_iter().map(|v| escape(v.as_ref())).collect());
		self
	}

	/// Append a data element made of pre-encoded group elements.
	pub fn raw(mut self, groups: Vec<Vec<u8>>) -> Self {
		self.elements.push(groups);
		self
	}

	/// Append a binary data element.
	pub fn binary(mut self, data: &[u8]) -> Self {
		self.elements.push(vec![binary(data)]);
		self
	}

	/// Serialize with the given segment number. Trailing empty elements are omitted.
	pub fn encode(&self, number: u32) -> Vec<u8> {
		let mut out = format!("{}:{}:{}", self.kind, number, self.version).into_bytes();

		let mut elements: Vec<&[Vec<u8>]> = self
			.elements
			.iter()
			.map(|groups| {
				let used = groups
					.iter()
					.rposition(|g| !g.is_empty())
					.map_or(0, |p| p + 1);
				&groups[..used]
			})
			.collect();
		while elements.last().is_some_and(|groups| groups.is_empty()) {
			elements.pop();
		}

		for groups in elements {
			out.push(b'+');
			for (i, group) in groups.iter().enumerate() {
				if i > 0 {
					out.push(b':');
				}
				out.extend_from_slice(group);
			}
		}
		out.push(b'\'');
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_escapes_and_groups() {
		let segments =
			parse_segments(b"HIRMG:2:2+0010::Nachricht entgegengenommen.+3060::Bitte beachten?: Hinweise?''").expect("parse");
		assert_eq!(segments.len(), 1);
		let seg = &segments[0];
		assert_eq!(seg.kind, "HIRMG");
		assert_eq!(seg.number, 2);
		assert_eq!(seg.version, 2);
		assert_eq!(seg.reference, None);
		assert_eq!(seg.text(0, 0).as_deref(), Some("0010"));
		assert_eq!(seg.text(0, 1), None);
		assert_eq!(seg.text(1, 2).as_deref(), Some("Bitte beachten: Hinweise'"));
	}

	#[test]
	fn parses_binary_data_containing_delimiters() {
		let segments = parse_segments(b"HIKAZ:5:7:3+@7@a+b:c'd'").expect("parse");
		assert_eq!(segments[0].reference, Some(3));
		assert_eq!(segments[0].bytes(0, 0), Some(&b"a+b:c'd"[..]));
	}

	#[test]
	fn flattens_encryption_envelope() {
		let inner = b"HNSHK:2:4+PIN:1'HIRMS:3:2:3+0020::Auftrag ausgef\xfchrt.'";
		let mut message = b"HNHBK:1:3+000000000100+300+dlg1+1'HNVSD:999:1+".to_vec();
		message.extend(binary(inner));
		message.extend_from_slice(b"'HNHBS:4:1+1'");

		let segments = parse_segments(&message).expect("parse");
		let kinds: Vec<&str> = segments.iter().map(|s| s.kind.as_str()).collect();
		assert_eq!(kinds, vec!["HNHBK", "HNSHK", "HIRMS", "HNHBS"]);
		assert_eq!(segments[2].text(0, 2).as_deref(), Some("Auftrag ausgeführt."));
	}

	#[test]
	fn rejects_truncated_messages() {
		assert!(parse_segments(b"HIRMG:2:2+0010").is_err());
		assert!(parse_segments(b"HIKAZ:5:7+@20@short'").is_err());
		assert!(matches!(
			parse_segments(b"HIKAZ:5:7:3+@18446744073709551615@x'"),
			Err(BankError::ParseError(_))
		));
	}

	#[test]
	fn encodes_with_escaping_and_trimmed_tail() {
		let segment = SegmentBuilder::new("HKKAZ", 7)
			.group(["DE02120300000000202051", "BYLADEM1001", "202051", "", "280", "12030000"])
			.text("N")
			.text("20261012")
			.empty()
			.empty();
		assert_eq!(
			segment.encode(3),
			b"HKKAZ:3:7+DE02120300000000202051:BYLADEM1001:202051::280:12030000+N+20261012'".to_vec()
		);

		let pin = SegmentBuilder::new("HNSHA", 2).text("1234").empty().text("p+w:?'@");
		assert_eq!(pin.encode(5), b"HNSHA:5:2+1234++p?+w?:???'?@'".to_vec());
	}

	#[test]
	fn encoded_segments_parse_back() {
		let bytes = SegmentBuilder::new("HKTAN", 6)
			.text("2")
			.empty()
			.empty()
			.empty()
			.text("ref:1")
			.text("N")
			.encode(4);
		let segments = parse_segments(&bytes).expect("parse");
		assert_eq!(segments[0].text(4, 0).as_deref(), Some("ref:1"));
		assert_eq!(segments[0].text(1, 0), None);
	}
}
