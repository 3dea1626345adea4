mod factories;
mod initiator;
mod mediation_order;
mod transfers;
