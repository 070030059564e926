/// Position of one syntactic element inside a message.
///
/// Rank 0 is the token, ranks 1.. are the comma separated fields that
/// follow. Only a line starting with a command prefix such as `+` or `^`
/// is split at its first `:`, anything else is a token on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Element {
    pub start: usize,
    /// Exclusive end offset
    pub end: usize,
    pub size: usize,
    pub rank: u8,
    /// No element follows this one
    pub last: bool,
}

impl Element {
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.start..self.end]
    }
}

/// Iterator over the elements of a message.
///
/// An empty message yields a single empty rank 0 element, which is how a
/// command without parameters shows up.
/// First characters of tokens that carry a `:` separated field list.
const TOKEN_PREFIXES: &[u8] = b"+^$#%*";

pub struct Elements<'a> {
    data: &'a [u8],
    pos: usize,
    rank: u8,
    done: bool,
}

impl<'a> Elements<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            rank: 0,
            done: false,
        }
    }

    fn token(&mut self) -> Element {
        let colon = match self.data.first() {
            Some(first) if TOKEN_PREFIXES.contains(first) => {
                self.data.iter().position(|b| *b == b':')
            }
            _ => None,
        };
        let end = colon.unwrap_or(self.data.len());
        let last = end == self.data.len();
        // Skip the colon and the blanks after it
        let mut next = end + 1;
        while next < self.data.len() && self.data[next] == b' ' {
            next += 1;
        }
        self.pos = next;
        Element {
            start: 0,
            end,
            size: end,
            rank: 0,
            last,
        }
    }

    fn field(&mut self) -> Element {
        let start = self.pos.min(self.data.len());
        let mut quoted = false;
        let mut end = start;
        while end < self.data.len() {
            match self.data[end] {
                b'"' => quoted = !quoted,
                b',' if !quoted => break,
                _ => {}
            }
            end += 1;
        }
        let last = end >= self.data.len();
        self.pos = end + 1;
        Element {
            start,
            end,
            size: end - start,
            rank: self.rank,
            last,
        }
    }
}

impl Iterator for Elements<'_> {
    type Item = Element;

    fn next(&mut self) -> Option<Element> {
        if self.done {
            return None;
        }
        let element = if self.rank == 0 {
            self.token()
        } else {
            self.field()
        };
        self.done = element.last;
        self.rank = self.rank.saturating_add(1);
        Some(element)
    }
}
