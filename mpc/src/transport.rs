use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    FutureExt, Sink, SinkExt, Stream, StreamExt,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio_serde::formats::Bincode;
use tokio_util::codec::LengthDelimitedCodec;

/// Error type for channels. Carries the ID of the peer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Error while sending message to {0}")]
    Send(usize),
    #[error("Error while receiving message from {0}")]
    Recv(usize),
    #[error("No channel to party {0}")]
    UnknownParty(usize),
}

/// Reliable, ordered, authenticated point-to-point links between all parties.
///
/// Party IDs are 1-based. Messages to oneself are never sent; protocols keep their
/// own contribution locally.
#[async_trait(?Send)]
pub trait Network {
    /// Number of parties participating in multi-party protocol.
    fn num_parties(&self) -> usize;

    /// ID of current party.
    fn party_id(&self) -> usize;

    /// Send message to party with given ID.
    async fn send(&mut self, to: usize, msg: Vec<u8>) -> Result<(), TransportError>;

    /// Receive the next message from party with given ID.
    async fn receive(&mut self, from: usize) -> Result<Vec<u8>, TransportError>;

    /// Send message to every other party.
    async fn send_to_all(&mut self, msg: Vec<u8>) -> Result<(), TransportError>;

    /// Receive one message from every other party, in ascending party order.
    async fn receive_from_all(&mut self) -> Result<Vec<(usize, Vec<u8>)>, TransportError>;

    /// IDs of all parties except the current one.
    fn peers(&self) -> Vec<usize> {
        (1..=self.num_parties())
            .filter(|&id| id != self.party_id())
            .collect()
    }
}

/// Wrapper for peer-to-peer connections in multi-party protocol.
pub struct MultipartyTransport<T, Channel> {
    channels: Vec<Option<(SplitSink<Channel, T>, SplitStream<Channel>)>>,
    party_id: usize,
}

impl<T, Channel> MultipartyTransport<T, Channel>
where
    Channel: Stream + Sink<T>,
{
    /// Create wrapper for given list of connections, where entry `i` connects to party `i + 1`.
    /// All channels but the one at `party_id - 1` should be present.
    pub fn new(
        channels: impl IntoIterator<Item = Option<Channel>>,
        party_id: usize,
    ) -> Result<Self, TransportError> {
        // We split streams into unidirectional halves. This allows us to
        // asynchronously wait on both receives and sends without bothering borrow checker.
        let channels: Vec<_> = channels.into_iter().map(|x| x.map(|x| x.split())).collect();
        for (j, channel) in channels.iter().enumerate() {
            if j + 1 != party_id && channel.is_none() {
                return Err(TransportError::UnknownParty(j + 1));
            }
        }
        Ok(Self { channels, party_id })
    }
}

impl<T, Channel> MultipartyTransport<T, Channel> {
    /// Number of parties participating in multi-party protocol.
    pub fn num_parties(&self) -> usize {
        self.channels.len()
    }

    /// ID of current party.
    pub fn party_id(&self) -> usize {
        self.party_id
    }

    fn channel_mut(
        &mut self,
        other_id: usize,
    ) -> Result<&mut (SplitSink<Channel, T>, SplitStream<Channel>), TransportError> {
        if other_id == self.party_id || other_id == 0 {
            return Err(TransportError::UnknownParty(other_id));
        }
        self.channels
            .get_mut(other_id - 1)
            .and_then(Option::as_mut)
            .ok_or(TransportError::UnknownParty(other_id))
    }
}

impl<T, E, Channel> MultipartyTransport<T, Channel>
where
    T: Clone + Unpin,
    Channel: Stream<Item = Result<T, E>> + Sink<T> + Unpin,
{
    /// Send message to party with given ID.
    pub async fn send_to(&mut self, other_id: usize, msg: T) -> Result<(), TransportError> {
        let (sink, _) = self.channel_mut(other_id)?;
        sink.send(msg)
            .await
            .map_err(|_| TransportError::Send(other_id))
    }

    /// Receive message from party with given ID.
    pub async fn receive_from(&mut self, other_id: usize) -> Result<T, TransportError> {
        let (_, stream) = self.channel_mut(other_id)?;
        match stream.next().await {
            Some(Ok(msg)) => Ok(msg),
            _ => Err(TransportError::Recv(other_id)),
        }
    }

    /// Send message to all parties.
    pub async fn broadcast(&mut self, msg: T) -> Result<(), TransportError> {
        let party_id = self.party_id;
        futures::future::try_join_all(
            self.channels
                .iter_mut()
                .enumerate()
                .map(|(index, channel)| (index + 1, channel))
                .filter(|(id, _)| *id != party_id)
                .map(|(id, channel)| {
                    let msg = msg.clone();
                    async move {
                        let (sink, _) = channel.as_mut().ok_or(TransportError::UnknownParty(id))?;
                        sink.send(msg).await.map_err(|_| TransportError::Send(id))
                    }
                }),
        )
        .await
        .map(|_| ())
    }

    /// Receive messages from all parties.
    pub async fn gather(&mut self) -> Result<Vec<(usize, T)>, TransportError> {
        let party_id = self.party_id;
        futures::future::try_join_all(
            self.channels
                .iter_mut()
                .enumerate()
                .map(|(index, channel)| (index + 1, channel))
                .filter(|(id, _)| *id != party_id)
                .map(|(id, channel)| async move {
                    let (_, stream) = channel.as_mut().ok_or(TransportError::UnknownParty(id))?;
                    stream
                        .next()
                        .map(move |raw| match raw {
                            Some(Ok(msg)) => Ok((id, msg)),
                            _ => Err(TransportError::Recv(id)),
                        })
                        .await
                }),
        )
        .await
    }
}

#[async_trait(?Send)]
impl<E, Channel> Network for MultipartyTransport<Vec<u8>, Channel>
where
    Channel: Stream<Item = Result<Vec<u8>, E>> + Sink<Vec<u8>> + Unpin,
{
    fn num_parties(&self) -> usize {
        MultipartyTransport::num_parties(self)
    }

    fn party_id(&self) -> usize {
        MultipartyTransport::party_id(self)
    }

    async fn send(&mut self, to: usize, msg: Vec<u8>) -> Result<(), TransportError> {
        self.send_to(to, msg).await
    }

    async fn receive(&mut self, from: usize) -> Result<Vec<u8>, TransportError> {
        self.receive_from(from).await
    }

    async fn send_to_all(&mut self, msg: Vec<u8>) -> Result<(), TransportError> {
        self.broadcast(msg).await
    }

    async fn receive_from_all(&mut self) -> Result<Vec<(usize, Vec<u8>)>, TransportError> {
        self.gather().await
    }
}

/// Length-framed Bincode-encoded messages channel.
pub type BincodeStreamSink<T, C> =
    tokio_serde::Framed<tokio_util::codec::Framed<C, LengthDelimitedCodec>, T, T, Bincode<T, T>>;

/// Length-framed Bincode-encoded tokio's Duplex stream.
pub type BincodeDuplex<T> = BincodeStreamSink<T, DuplexStream>;

/// In-process network built by [`mock_multiparty_channels`].
pub type MockNetwork = MultipartyTransport<Vec<u8>, BincodeDuplex<Vec<u8>>>;

/// Create length-framed Bincode-encoded message channel from AsyncRead/Write.
pub fn wrap_bincode<T, C>(channel: C) -> BincodeStreamSink<T, C>
where
    C: AsyncRead + AsyncWrite,
{
    let length_delimited = tokio_util::codec::Framed::new(channel, LengthDelimitedCodec::new());
    tokio_serde::Framed::new(length_delimited, Bincode::default())
}

/// Create bidirectional Bincode-encoded channel.
pub fn bincode_duplex<T>(max_buf_size: usize) -> (BincodeDuplex<T>, BincodeDuplex<T>) {
    let (a, b) = tokio::io::duplex(max_buf_size);
    (wrap_bincode(a), wrap_bincode(b))
}

/// Create in-process channels for testing multiparty protocols.
/// Element `i` of the result belongs to party `i + 1`.
pub fn mock_multiparty_channels<T>(
    num_parties: usize,
    max_buf_size: usize,
) -> Vec<MultipartyTransport<T, BincodeDuplex<T>>>
where
    T: Clone + Serialize + DeserializeOwned + Unpin,
{
    let mut matrix: Vec<Vec<_>> = (0..num_parties)
        .map(|_| (0..num_parties).map(|_| None).collect())
        .collect();

    for i in 0..num_parties {
        for j in 0..i {
            let (a, b) = bincode_duplex::<T>(max_buf_size);
            matrix[i][j] = Some(a);
            matrix[j][i] = Some(b);
        }
    }

    matrix
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| MultipartyTransport::new(row, index + 1).ok())
        .collect()
}
